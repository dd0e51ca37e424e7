// Copyright 2019-2021 Parity Technologies (UK) Ltd.
// This file is part of Parity Bridges Common.

// Parity Bridges Common is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity Bridges Common is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity Bridges Common.  If not, see <http://www.gnu.org/licenses/>.

use thiserror::Error;

/// Fee computation failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeError {
	/// The deposit is smaller than the fixed fee component; settling it would produce a
	/// negative or zero transfer. The Listener rejects the message rather than emit one.
	#[error("deposit amount {0} is below the fixed fee {1}")]
	AmountBelowFixedFee(u128, u128),
	/// A configured `fixed_fee` exceeded the sanity threshold used to reject obviously
	/// misconfigured chains at startup (see the Open Question resolution in the design notes).
	#[error("configured fixed fee {0} exceeds the sanity threshold {1}")]
	FixedFeeTooHigh(u128, u128),
}

/// Named, per-chain fee parameters. Historically hard-coded with different values across
/// revisions of the source tool; this crate treats them as configuration, per the Open
/// Question resolution documented alongside the expanded specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeParams {
	/// Flat component of the fee, in the *destination* chain's base unit.
	pub fixed_fee: u128,
	/// Proportional component: `deposit_amount / fee_rate` is added to `fixed_fee`.
	pub fee_rate: u128,
	/// Power-of-ten divisor applied to amounts leaving Chain-E to reach the destination
	/// chain's base unit (the source calls this "token scale"; default divides by `10^6`).
	pub token_scale: u32,
}

impl FeeParams {
	/// A fixed fee above this fraction of a notional 1-KSM-equivalent base unit
	/// (`10^12`) is rejected at configuration time as very likely a misconfiguration
	/// (wrong magnitude / wrong decimal base).
	pub const SANITY_THRESHOLD: u128 = 10u128.pow(11);

	/// Validates `self` against the sanity threshold.
	pub fn validate(&self) -> Result<(), FeeError> {
		if self.fixed_fee > Self::SANITY_THRESHOLD {
			return Err(FeeError::FixedFeeTooHigh(self.fixed_fee, Self::SANITY_THRESHOLD));
		}
		Ok(())
	}

	/// Computes `fee = fixed_fee + deposit_amount / fee_rate` and
	/// `settled_amount = deposit_amount - fee`, after first dividing `deposit_amount` (assumed
	/// to be denominated in Chain-E's base unit) by `10^token_scale`.
	///
	/// Returns [`FeeError::AmountBelowFixedFee`] if the post-scale amount is smaller than
	/// `fixed_fee`, matching "for `deposit_amount < fixed_fee`, the message is rejected at the
	/// Listener".
	pub fn settle(&self, deposit_amount_on_source: u128) -> Result<Settlement, FeeError> {
		let deposit_amount = deposit_amount_on_source / 10u128.pow(self.token_scale);
		if deposit_amount < self.fixed_fee {
			return Err(FeeError::AmountBelowFixedFee(deposit_amount, self.fixed_fee));
		}
		let fee = self.fixed_fee + deposit_amount / self.fee_rate;
		let settled_amount = deposit_amount - fee;
		Ok(Settlement { deposit_amount, fee, settled_amount })
	}
}

impl Default for FeeParams {
	fn default() -> Self {
		FeeParams {
			fixed_fee: 3 * 10u128.pow(10), // 0.03 * 10^12
			fee_rate: 1000,
			token_scale: 6,
		}
	}
}

/// Result of [`FeeParams::settle`]. `settled_amount + fee == deposit_amount` always holds
/// (property P7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
	/// Deposit amount after the token-scale division, before fee deduction.
	pub deposit_amount: u128,
	/// Computed fee.
	pub fee: u128,
	/// `deposit_amount - fee`; what the writer actually transfers.
	pub settled_amount: u128,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fee_round_trip_holds_for_sufficient_deposits() {
		let params = FeeParams::default();
		// 10 KSM on Chain-E, scaled by 10^6, fixed_fee=0.03e12, fee_rate=1000
		let settlement = params.settle(10 * 10u128.pow(12) * 10u128.pow(6)).unwrap();
		assert_eq!(settlement.deposit_amount, 10 * 10u128.pow(12));
		assert_eq!(settlement.settled_amount + settlement.fee, settlement.deposit_amount);
		assert_eq!(settlement.settled_amount, 9_960_000_000_000);
	}

	#[test]
	fn fee_rejects_deposits_below_fixed_fee() {
		let params = FeeParams::default();
		let tiny = params.fixed_fee - 1;
		assert!(matches!(params.settle(tiny * 10u128.pow(params.token_scale)), Err(FeeError::AmountBelowFixedFee(_, _))));
	}

	#[test]
	fn validate_rejects_absurd_fixed_fee() {
		let params = FeeParams { fixed_fee: FeeParams::SANITY_THRESHOLD + 1, ..FeeParams::default() };
		assert!(params.validate().is_err());
	}

	#[test]
	fn validate_accepts_defaults() {
		assert!(FeeParams::default().validate().is_ok());
	}
}
