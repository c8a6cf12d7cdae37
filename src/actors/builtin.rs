// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Registry of builtin actor code CIDs.
//!
//! Up to actors v7 code identifiers are raw CIDs whose identity multihash
//! inlines `fil/<n>/<name>`; actors v0 was published under `fil/1/`. From
//! v8 on actors ship as WASM bundles and their codes are only known through
//! the bundle manifest, which must be loaded from a blockstore and
//! registered here before states of those versions can be recognized.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use ahash::{HashMap, HashSet};
use anyhow::{Context as _, ensure};
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::CborStore as _;
use itertools::Itertools as _;
use parking_lot::RwLock;
use strum::IntoEnumIterator as _;

use crate::utils::cid::{identity_payload, identity_raw_cid};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumIter,
)]
pub enum ActorVersion {
    V0,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    V10,
}

impl ActorVersion {
    pub fn number(self) -> u64 {
        match self {
            Self::V0 => 0,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
            Self::V5 => 5,
            Self::V6 => 6,
            Self::V7 => 7,
            Self::V8 => 8,
            Self::V9 => 9,
            Self::V10 => 10,
        }
    }

    pub fn from_number(n: u64) -> Option<Self> {
        Self::iter().find(|v| v.number() == n)
    }

    /// Whether this version's codes are identity CIDs rather than bundle
    /// manifest entries.
    pub fn has_identity_codes(self) -> bool {
        self < Self::V8
    }

    /// Number used in the code path of this version's actors.
    fn code_prefix(self) -> u64 {
        match self {
            Self::V0 => 1,
            v => v.number(),
        }
    }

    fn from_code_prefix(n: u64) -> Option<Self> {
        Self::iter()
            .filter(|v| v.has_identity_codes())
            .find(|v| v.code_prefix() == n)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinActor {
    Account,
    Init,
    Cron,
    System,
    Reward,
    #[strum(serialize = "storagepower")]
    Power,
    #[strum(serialize = "storagemarket")]
    Market,
    #[strum(serialize = "storageminer")]
    Miner,
    Multisig,
    #[strum(serialize = "paymentchannel")]
    PaymentChannel,
    #[strum(serialize = "verifiedregistry")]
    VerifiedRegistry,
}

static IDENTITY_CODES: LazyLock<HashMap<(BuiltinActor, ActorVersion), Cid>> =
    LazyLock::new(|| {
        BuiltinActor::iter()
            .flat_map(|actor| ActorVersion::iter().map(move |v| (actor, v)))
            .filter(|(_, v)| v.has_identity_codes())
            .filter_map(|(actor, v)| {
                let name = format!("fil/{}/{}", v.code_prefix(), actor);
                Some(((actor, v), identity_raw_cid(&name).ok()?))
            })
            .collect()
    });

static BY_IDENTITY_CODE: LazyLock<HashMap<Cid, (BuiltinActor, ActorVersion)>> =
    LazyLock::new(|| IDENTITY_CODES.iter().map(|(k, cid)| (*cid, *k)).collect());

impl BuiltinActor {
    const MANDATORY: &[BuiltinActor] = &[BuiltinActor::Init, BuiltinActor::System];

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Code CID of this actor at `version`. `None` for bundled versions
    /// whose manifest has not been registered.
    pub fn code(self, version: ActorVersion) -> Option<Cid> {
        if version.has_identity_codes() {
            return IDENTITY_CODES.get(&(self, version)).copied();
        }
        REGISTRY.read().by_actor.get(&(self, version)).copied()
    }
}

/// Builtin actors to their code CIDs, as listed by a bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinActorManifest {
    builtin2cid: BTreeMap<BuiltinActor, Cid>,
    /// The actor list this manifest was built from
    actor_list_cid: Cid,
}

impl BuiltinActorManifest {
    /// Loads a manifest, a `(version, actor list)` pair, from `store`.
    pub fn load_manifest(store: &impl Blockstore, manifest_cid: &Cid) -> anyhow::Result<Self> {
        let (manifest_version, actor_list_cid) = store
            .get_cbor::<(u32, Cid)>(manifest_cid)?
            .with_context(|| format!("manifest {manifest_cid} not found"))?;
        ensure!(
            manifest_version == 1,
            "unsupported manifest version {manifest_version}"
        );
        Self::load_v1_actor_list(store, &actor_list_cid)
    }

    pub fn load_v1_actor_list(
        store: &impl Blockstore,
        actor_list_cid: &Cid,
    ) -> anyhow::Result<Self> {
        let mut actor_list = store
            .get_cbor::<Vec<(String, Cid)>>(actor_list_cid)?
            .with_context(|| format!("actor list {actor_list_cid} not found"))?;
        actor_list.sort();
        ensure!(
            actor_list.iter().map(|(name, _)| name).all_unique(),
            "duplicate actor name in actor list"
        );
        let mut name2cid = BTreeMap::from_iter(actor_list);
        let mut builtin2cid = BTreeMap::new();
        for builtin in BuiltinActor::iter() {
            if let Some(cid) = name2cid.remove(builtin.name()) {
                builtin2cid.insert(builtin, cid);
            }
        }
        for mandatory in BuiltinActor::MANDATORY {
            ensure!(
                builtin2cid.contains_key(mandatory),
                "actor list does not contain mandatory actor {}",
                mandatory.name()
            );
        }
        if !name2cid.is_empty() {
            tracing::debug!("actors not indexed: [{}]", name2cid.keys().join(", "));
        }
        Ok(Self {
            builtin2cid,
            actor_list_cid: *actor_list_cid,
        })
    }

    pub fn get(&self, builtin: BuiltinActor) -> anyhow::Result<Cid> {
        self.builtin2cid
            .get(&builtin)
            .copied()
            .with_context(|| format!("builtin actor {} is not in the manifest", builtin.name()))
    }

    pub fn source_cid(&self) -> Cid {
        self.actor_list_cid
    }

    pub fn builtin_actors(&self) -> impl ExactSizeIterator<Item = (BuiltinActor, Cid)> + '_ {
        self.builtin2cid.iter().map(|(k, v)| (*k, *v))
    }
}

#[derive(Debug, Default)]
struct Registry {
    by_code: HashMap<Cid, (BuiltinActor, ActorVersion)>,
    by_actor: HashMap<(BuiltinActor, ActorVersion), Cid>,
    actor_lists: HashSet<Cid>,
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(Default::default);

/// Makes the codes of `manifest` resolve to `version`. Registering the same
/// manifest again is a no-op; a code already registered under another
/// actor or version is an error.
pub fn register(manifest: &BuiltinActorManifest, version: ActorVersion) -> anyhow::Result<()> {
    ensure!(
        !version.has_identity_codes(),
        "actors {version} codes are not taken from manifests"
    );
    let mut registry = REGISTRY.write();
    if registry.actor_lists.contains(&manifest.source_cid()) {
        return Ok(());
    }
    for (actor, code) in manifest.builtin_actors() {
        if let Some(existing) = registry.by_code.get(&code) {
            ensure!(
                *existing == (actor, version),
                "code {code} is already registered as {} {}",
                existing.0,
                existing.1
            );
        }
    }
    for (actor, code) in manifest.builtin_actors() {
        registry.by_code.insert(code, (actor, version));
        registry.by_actor.entry((actor, version)).or_insert(code);
    }
    registry.actor_lists.insert(manifest.source_cid());
    tracing::debug!(
        actor_list = %manifest.source_cid(),
        %version,
        "registered builtin actor manifest"
    );
    Ok(())
}

/// A released actor bundle.
#[derive(Debug, Clone)]
pub struct KnownBundle {
    pub manifest: &'static str,
    pub release: &'static str,
    pub network: &'static str,
    pub version: ActorVersion,
}

macro_rules! known_bundles {
    ($($cid:literal @ $release:literal for $network:literal => $version:ident),* $(,)?) => {
        &[
            $(
                KnownBundle {
                    manifest: $cid,
                    release: $release,
                    network: $network,
                    version: ActorVersion::$version,
                },
            )*
        ]
    };
}

pub const KNOWN_BUNDLES: &[KnownBundle] = known_bundles![
    "bafy2bzacedbedgynklc4dgpyxippkxmba2mgtw7ecntoneclsvvl4klqwuyyy" @ "v9.0.3" for "calibrationnet" => V9,
    "bafy2bzaced25ta3j6ygs34roprilbtb3f6mxifyfnm7z7ndquaruxzdq3y7lo" @ "v10.0.0-rc.1" for "calibrationnet" => V10,
    "bafy2bzacedozk3jh2j4nobqotkbofodq4chbrabioxbfrygpldgoxs3zwgggk" @ "v9.0.3" for "devnet" => V9,
    "bafy2bzacebzz376j5kizfck56366kdz5aut6ktqrvqbi3efa2d4l2o2m653ts" @ "v10.0.0" for "devnet" => V10,
    "bafy2bzaceb6j6666h36xnhksu3ww4kxb6e25niayfgkdnifaqi6m6ooc66i6i" @ "v9.0.3" for "mainnet" => V9,
    "bafy2bzacecsuyf7mmvrhkx2evng5gnz5canlnz2fdlzu2lvcgptiq2pzuovos" @ "v10.0.0" for "mainnet" => V10,
];

/// Loads and registers `manifest` as `version`.
pub fn register_manifest(
    store: &impl Blockstore,
    manifest: &Cid,
    version: ActorVersion,
) -> anyhow::Result<()> {
    let loaded = BuiltinActorManifest::load_manifest(store, manifest)
        .with_context(|| format!("loading actors {version} manifest {manifest}"))?;
    register(&loaded, version)
}

/// Registers every [`KNOWN_BUNDLES`] manifest present in `store` and
/// returns how many were found.
pub fn register_known_bundles(store: &impl Blockstore) -> anyhow::Result<usize> {
    let mut found = 0;
    for bundle in KNOWN_BUNDLES {
        let manifest: Cid = bundle.manifest.parse()?;
        if !store.has(&manifest)? {
            tracing::debug!(
                %manifest,
                network = bundle.network,
                release = bundle.release,
                "actor bundle not in store"
            );
            continue;
        }
        register_manifest(store, &manifest, bundle.version)?;
        found += 1;
    }
    Ok(found)
}

/// Resolves a code CID to the builtin actor and version it identifies.
pub fn resolve(code: &Cid) -> Option<(BuiltinActor, ActorVersion)> {
    if let Some(found) = BY_IDENTITY_CODE.get(code) {
        return Some(*found);
    }
    if let Some(found) = REGISTRY.read().by_code.get(code) {
        return Some(*found);
    }
    // tolerate identity codes minted with another CID version or codec
    let path = std::str::from_utf8(identity_payload(code)?).ok()?;
    let mut parts = path.split('/');
    let (Some("fil"), Some(n), Some(name), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let version = ActorVersion::from_code_prefix(n.parse().ok()?)?;
    let actor = name.parse().ok()?;
    Some((actor, version))
}

pub fn is_miner_code(code: &Cid) -> bool {
    matches!(resolve(code), Some((BuiltinActor::Miner, _)))
}

pub fn is_init_code(code: &Cid) -> bool {
    matches!(resolve(code), Some((BuiltinActor::Init, _)))
}

/// Codes whose containers were written in a format the structural diff
/// cannot walk.
pub fn is_legacy_code(code: &Cid) -> bool {
    matches!(
        resolve(code),
        Some((
            BuiltinActor::Init | BuiltinActor::Miner | BuiltinActor::Market,
            ActorVersion::V0 | ActorVersion::V2
        ))
    )
}
