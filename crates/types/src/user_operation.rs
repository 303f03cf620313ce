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

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U128, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// Canonical ERC-4337 v0.7 entry point
pub const ENTRY_POINT_V0_7: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");

/// User Operation (v0.7)
///
/// Offchain version, must be packed before hashing or sending onchain.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// Sender, the 7702 delegated EOA
    pub sender: Address,
    /// Entry point nonce
    pub nonce: U256,
    /// Factory, unused for 7702 accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// Factory data
    #[serde(default)]
    pub factory_data: Bytes,
    /// Account calldata
    pub call_data: Bytes,
    /// Call gas limit
    pub call_gas_limit: U128,
    /// Verification gas limit
    pub verification_gas_limit: U128,
    /// Pre-verification gas
    pub pre_verification_gas: U256,
    /// Max priority fee per gas
    pub max_priority_fee_per_gas: U128,
    /// Max fee per gas
    pub max_fee_per_gas: U128,
    /// Paymaster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Paymaster verification gas limit
    #[serde(default)]
    pub paymaster_verification_gas_limit: U128,
    /// Paymaster post-op gas limit
    #[serde(default)]
    pub paymaster_post_op_gas_limit: U128,
    /// Paymaster data
    #[serde(default)]
    pub paymaster_data: Bytes,
    /// Signature
    #[serde(default)]
    pub signature: Bytes,
}

/// Packed form used by the entry point
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PackedUserOperation {
    /// Sender
    pub sender: Address,
    /// Nonce
    pub nonce: U256,
    /// `factory || factoryData`
    pub init_code: Bytes,
    /// Calldata
    pub call_data: Bytes,
    /// `verificationGasLimit || callGasLimit`
    pub account_gas_limits: B256,
    /// Pre-verification gas
    pub pre_verification_gas: U256,
    /// `maxPriorityFeePerGas || maxFeePerGas`
    pub gas_fees: B256,
    /// `paymaster || pmVerificationGas || pmPostOpGas || paymasterData`
    pub paymaster_and_data: Bytes,
    /// Signature
    pub signature: Bytes,
}

impl UserOperation {
    /// Pack the operation
    pub fn pack(&self) -> PackedUserOperation {
        let init_code = match self.factory {
            Some(factory) => {
                let mut init_code = factory.to_vec();
                init_code.extend_from_slice(&self.factory_data);
                Bytes::from(init_code)
            }
            None => Bytes::new(),
        };

        let paymaster_and_data = match self.paymaster {
            Some(paymaster) => {
                let mut paymaster_and_data = paymaster.to_vec();
                paymaster_and_data.extend_from_slice(
                    &self.paymaster_verification_gas_limit.to_be_bytes::<16>(),
                );
                paymaster_and_data
                    .extend_from_slice(&self.paymaster_post_op_gas_limit.to_be_bytes::<16>());
                paymaster_and_data.extend_from_slice(&self.paymaster_data);
                Bytes::from(paymaster_and_data)
            }
            None => Bytes::new(),
        };

        PackedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            init_code,
            call_data: self.call_data.clone(),
            account_gas_limits: concat_128(self.verification_gas_limit, self.call_gas_limit),
            pre_verification_gas: self.pre_verification_gas,
            gas_fees: concat_128(self.max_priority_fee_per_gas, self.max_fee_per_gas),
            paymaster_and_data,
            signature: self.signature.clone(),
        }
    }

    /// The hash the account signs, bound to `entry_point` and `chain_id`
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let puo = self.pack();
        let encoded = (
            puo.sender,
            puo.nonce,
            keccak256(&puo.init_code),
            keccak256(&puo.call_data),
            puo.account_gas_limits,
            puo.pre_verification_gas,
            puo.gas_fees,
            keccak256(&puo.paymaster_and_data),
        )
            .abi_encode();

        keccak256((keccak256(encoded), entry_point, U256::from(chain_id)).abi_encode())
    }
}

fn concat_128(high: U128, low: U128) -> B256 {
    let mut out = [0_u8; 32];
    out[..16].copy_from_slice(&high.to_be_bytes::<16>());
    out[16..].copy_from_slice(&low.to_be_bytes::<16>());
    B256::from(out)
}

/// ERC-4337 account backed by a 7702 delegated EOA
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartAccount {
    /// Account address, equal to the EOA
    pub address: Address,
    /// Delegation target providing the account code
    pub delegatee: Address,
    /// Entry point the account validates against
    pub entry_point: Address,
    /// Chain the account lives on
    pub chain_id: u64,
}
