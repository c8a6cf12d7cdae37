// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_encoding::RawBytes;

use crate::ipld::Ipld;

/// Result of executing one message. Receipts written before events existed
/// have three fields, later ones append the events root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub exit_code: i64,
    pub return_data: RawBytes,
    pub gas_used: i64,
    pub events_root: Option<Cid>,
}

impl Receipt {
    pub fn from_ipld(ipld: &Ipld) -> anyhow::Result<Self> {
        let Ipld::List(fields) = ipld else {
            anyhow::bail!("receipt is not a list");
        };
        let integer = |i: usize| -> anyhow::Result<i64> {
            match fields.get(i) {
                Some(Ipld::Integer(v)) => Ok(i64::try_from(*v)?),
                other => anyhow::bail!("receipt field {i}: expected integer, got {other:?}"),
            }
        };
        let return_data = match fields.get(1) {
            Some(Ipld::Bytes(b)) => RawBytes::new(b.clone()),
            other => anyhow::bail!("receipt return data: expected bytes, got {other:?}"),
        };
        let events_root = match fields.get(3) {
            None | Some(Ipld::Null) => None,
            Some(Ipld::Link(c)) => Some(*c),
            Some(other) => anyhow::bail!("receipt events root: expected link, got {other:?}"),
        };
        anyhow::ensure!(fields.len() <= 4, "receipt has {} fields", fields.len());
        Ok(Self {
            exit_code: integer(0).context("exit code")?,
            return_data,
            gas_used: integer(2).context("gas used")?,
            events_root,
        })
    }

    pub fn to_ipld(&self) -> Ipld {
        let mut fields = vec![
            Ipld::Integer(self.exit_code.into()),
            Ipld::Bytes(self.return_data.to_vec()),
            Ipld::Integer(self.gas_used.into()),
        ];
        if let Some(root) = self.events_root {
            fields.push(Ipld::Link(root));
        }
        Ipld::List(fields)
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_and_event_receipts_decode() {
        let legacy = Receipt {
            exit_code: 16,
            return_data: RawBytes::new(vec![1, 2]),
            gas_used: 1234,
            events_root: None,
        };
        assert_eq!(Receipt::from_ipld(&legacy.to_ipld()).unwrap(), legacy);
        assert!(!legacy.is_success());

        let with_events = Receipt {
            events_root: Some(Cid::default()),
            exit_code: 0,
            ..legacy
        };
        assert_eq!(
            Receipt::from_ipld(&with_events.to_ipld()).unwrap(),
            with_events
        );
        assert!(Receipt::from_ipld(&Ipld::Integer(3)).is_err());
    }
}
