// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Conversions from the `fvm_shared` generations the versioned actor state
//! crates are built on to the generation used across the indexer.

use anyhow::Context as _;
use fvm_shared2::address::Address as AddressV2;
use fvm_shared2::econ::TokenAmount as TokenAmountV2;
use fvm_shared2::sector::RegisteredPoStProof as RegisteredPoStProofV2;
use fvm_shared2::sector::RegisteredSealProof as RegisteredSealProofV2;
use fvm_shared3::address::Address as AddressV3;
use fvm_shared3::econ::TokenAmount as TokenAmountV3;
use fvm_shared3::sector::RegisteredPoStProof as RegisteredPoStProofV3;
use fvm_shared3::sector::RegisteredSealProof as RegisteredSealProofV3;
use fvm_shared4::address::Address as AddressV4;
use fvm_shared4::econ::TokenAmount as TokenAmountV4;
use fvm_shared4::sector::RegisteredPoStProof as RegisteredPoStProofV4;
use fvm_shared4::sector::RegisteredSealProof as RegisteredSealProofV4;

pub fn from_address_v2_to_v4(addr: &AddressV2) -> anyhow::Result<AddressV4> {
    AddressV4::from_bytes(&addr.to_bytes())
        .with_context(|| format!("converting FVM2 address {addr}"))
}

pub fn from_address_v3_to_v4(addr: &AddressV3) -> anyhow::Result<AddressV4> {
    AddressV4::from_bytes(&addr.to_bytes())
        .with_context(|| format!("converting FVM3 address {addr}"))
}

pub fn from_token_v2_to_v4(token: &TokenAmountV2) -> TokenAmountV4 {
    TokenAmountV4::from_atto(token.atto().clone())
}

pub fn from_token_v3_to_v4(token: &TokenAmountV3) -> TokenAmountV4 {
    TokenAmountV4::from_atto(token.atto().clone())
}

pub fn from_reg_seal_proof_v2_to_v4(proof: RegisteredSealProofV2) -> RegisteredSealProofV4 {
    let num_id: i64 = proof.into();
    RegisteredSealProofV4::from(num_id)
}

pub fn from_reg_seal_proof_v3_to_v4(proof: RegisteredSealProofV3) -> RegisteredSealProofV4 {
    let num_id: i64 = proof.into();
    RegisteredSealProofV4::from(num_id)
}

pub fn from_reg_post_proof_v2_to_v4(proof: RegisteredPoStProofV2) -> RegisteredPoStProofV4 {
    let num_id: i64 = proof.into();
    RegisteredPoStProofV4::from(num_id)
}

pub fn from_reg_post_proof_v3_to_v4(proof: RegisteredPoStProofV3) -> RegisteredPoStProofV4 {
    let num_id: i64 = proof.into();
    RegisteredPoStProofV4::from(num_id)
}

#[cfg(test)]
pub use self::backwards::*;

/// The other direction, for writing versioned fixtures.
#[cfg(test)]
mod backwards {
    use super::*;

    pub fn from_address_v4_to_v2(addr: &AddressV4) -> AddressV2 {
        AddressV2::from_bytes(&addr.to_bytes()).unwrap()
    }

    pub fn from_address_v4_to_v3(addr: &AddressV4) -> AddressV3 {
        AddressV3::from_bytes(&addr.to_bytes()).unwrap()
    }

    pub fn from_token_v4_to_v2(token: &TokenAmountV4) -> TokenAmountV2 {
        TokenAmountV2::from_atto(token.atto().clone())
    }

    pub fn from_token_v4_to_v3(token: &TokenAmountV4) -> TokenAmountV3 {
        TokenAmountV3::from_atto(token.atto().clone())
    }

    pub fn from_reg_seal_proof_v4_to_v2(proof: RegisteredSealProofV4) -> RegisteredSealProofV2 {
        let num_id: i64 = proof.into();
        RegisteredSealProofV2::from(num_id)
    }

    pub fn from_reg_seal_proof_v4_to_v3(proof: RegisteredSealProofV4) -> RegisteredSealProofV3 {
        let num_id: i64 = proof.into();
        RegisteredSealProofV3::from(num_id)
    }

    pub fn from_reg_post_proof_v4_to_v2(proof: RegisteredPoStProofV4) -> RegisteredPoStProofV2 {
        let num_id: i64 = proof.into();
        RegisteredPoStProofV2::from(num_id)
    }

    pub fn from_reg_post_proof_v4_to_v3(proof: RegisteredPoStProofV4) -> RegisteredPoStProofV3 {
        let num_id: i64 = proof.into();
        RegisteredPoStProofV3::from(num_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn values_survive_a_generation_round_trip() {
        let addr = AddressV4::new_id(1234);
        assert_eq!(from_address_v2_to_v4(&from_address_v4_to_v2(&addr)).unwrap(), addr);
        assert_eq!(from_address_v3_to_v4(&from_address_v4_to_v3(&addr)).unwrap(), addr);

        let token = TokenAmountV4::from_atto(987_654_321u64);
        assert_eq!(from_token_v2_to_v4(&from_token_v4_to_v2(&token)), token);
        assert_eq!(from_token_v3_to_v4(&from_token_v4_to_v3(&token)), token);

        let seal = RegisteredSealProofV4::StackedDRG64GiBV1P1;
        assert_eq!(from_reg_seal_proof_v2_to_v4(from_reg_seal_proof_v4_to_v2(seal)), seal);
        assert_eq!(from_reg_seal_proof_v3_to_v4(from_reg_seal_proof_v4_to_v3(seal)), seal);

        let post = RegisteredPoStProofV4::StackedDRGWindow32GiBV1P1;
        assert_eq!(from_reg_post_proof_v2_to_v4(from_reg_post_proof_v4_to_v2(post)), post);
        assert_eq!(from_reg_post_proof_v3_to_v4(from_reg_post_proof_v4_to_v3(post)), post);
    }
}
