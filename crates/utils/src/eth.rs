// This file is part of AAWallet.
//
// AAWallet is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// AAWallet is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with AAWallet.
// If not, see https://www.gnu.org/licenses/.

//! Utilities for [7702](https://github.com/ethereum/EIPs/blob/master/EIPS/eip-7702.md)
//! delegation designators and key material.

use alloy_primitives::{fixed_bytes, Address, Bytes, FixedBytes};

/// Code prefix of a delegated EOA
pub const DELEGATION_PREFIX: FixedBytes<3> = fixed_bytes!("ef0100");

/// Code installed on an EOA delegating to `delegatee`.
pub fn delegation_code(delegatee: Address) -> Bytes {
    let code: FixedBytes<23> = DELEGATION_PREFIX.concat_const(delegatee.into());
    code.into()
}

/// Returns the delegation target if `code` is a delegation designator.
pub fn parse_delegation_code(code: &[u8]) -> Option<Address> {
    if code.len() != 23 || code[..3] != DELEGATION_PREFIX[..] {
        return None;
    }
    Some(Address::from_slice(&code[3..]))
}

/// Returns true if `key` is `0x` followed by 64 hex characters.
pub fn is_well_formed_private_key(key: &str) -> bool {
    key.strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegation_code_round_trip() {
        let delegatee = Address::repeat_byte(0x42);
        let code = delegation_code(delegatee);
        assert_eq!(code.len(), 23);
        assert_eq!(&code[..3], &[0xef, 0x01, 0x00]);
        assert_eq!(parse_delegation_code(&code), Some(delegatee));
    }

    #[test]
    fn test_parse_rejects_contract_code() {
        assert_eq!(parse_delegation_code(&[]), None);
        assert_eq!(parse_delegation_code(&[0x60, 0x80, 0x60, 0x40]), None);
        let mut code = delegation_code(Address::ZERO).to_vec();
        code[2] = 0x01;
        assert_eq!(parse_delegation_code(&code), None);
        code.push(0);
        assert_eq!(parse_delegation_code(&code), None);
    }

    #[test]
    fn test_private_key_shape() {
        assert!(is_well_formed_private_key(&format!("0x{}", "11".repeat(32))));
        assert!(is_well_formed_private_key(&format!("0x{}", "aB".repeat(32))));
        assert!(!is_well_formed_private_key("0xAA"));
        assert!(!is_well_formed_private_key(&"11".repeat(32)));
        assert!(!is_well_formed_private_key(&format!("0x{}", "zz".repeat(32))));
        assert!(!is_well_formed_private_key(&format!("0x{}", "11".repeat(33))));
    }
}
