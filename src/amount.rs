//! Conversion between invoice amounts and the multiplier suffix carried in
//! the human-readable part.
//!
//! Amounts in the HRP are a decimal number followed by an optional multiplier
//! character scaling it down from one bitcoin: `m` (milli), `u` (micro), `n`
//! (nano) or `p` (pico). One pico-bitcoin is a tenth of a millisatoshi, so
//! `p` amounts must be multiples of ten. Encoding always picks the shortest
//! representation, i.e. the coarsest multiplier that divides the amount
//! evenly.

use std::convert::TryFrom;

use crate::Error;

/// Number of millisatoshis in one bitcoin.
pub const MSAT_PER_BTC: u64 = 100_000_000_000;

const MSAT_PER_MILLI_BTC: u64 = 100_000_000;
const MSAT_PER_MICRO_BTC: u64 = 100_000;
const MSAT_PER_NANO_BTC: u64 = 100;

/// Renders a millisatoshi amount as the shortest valid HRP suffix.
pub fn msat_to_prefix(msat: u64) -> String {
	if msat >= MSAT_PER_MILLI_BTC && msat % MSAT_PER_MILLI_BTC == 0 {
		format!("{}m", msat / MSAT_PER_MILLI_BTC)
	} else if msat >= MSAT_PER_MICRO_BTC && msat % MSAT_PER_MICRO_BTC == 0 {
		format!("{}u", msat / MSAT_PER_MICRO_BTC)
	} else if msat >= MSAT_PER_NANO_BTC && msat % MSAT_PER_NANO_BTC == 0 {
		format!("{}n", msat / MSAT_PER_NANO_BTC)
	} else {
		// One pico-bitcoin is 0.1 msat, so this cannot lose precision but
		// may exceed 64 bits.
		format!("{}p", u128::from(msat) * 10)
	}
}

/// Renders a satoshi amount as the shortest valid HRP suffix.
pub fn sat_to_prefix(sat: u64) -> Result<String, Error> {
	sat.checked_mul(1000).map(msat_to_prefix).ok_or(Error::InvalidAmount)
}

/// Parses an HRP amount suffix into millisatoshis.
///
/// The numeric part must be free of leading zeroes and the whole amount must
/// come to a whole number of millisatoshis no larger than `u64::MAX`.
pub fn prefix_to_msat(prefix: &str) -> Result<u64, Error> {
	if prefix.is_empty() {
		return Err(Error::InvalidAmount);
	}

	let (number, multiplier) = match prefix.as_bytes()[prefix.len() - 1] {
		m @ b'm' | m @ b'u' | m @ b'n' | m @ b'p' => (&prefix[..prefix.len() - 1], Some(m)),
		_ => (prefix, None),
	};
	if number.is_empty()
		|| !number.bytes().all(|b| b.is_ascii_digit())
		|| (number.len() > 1 && number.starts_with('0'))
	{
		return Err(Error::InvalidAmount);
	}
	let value = number.parse::<u128>().map_err(|_| Error::InvalidAmount)?;

	let msat = match multiplier {
		Some(b'p') => {
			if value % 10 != 0 {
				return Err(Error::InvalidAmount);
			}
			value / 10
		},
		Some(b'n') => value.checked_mul(u128::from(MSAT_PER_NANO_BTC)).ok_or(Error::InvalidAmount)?,
		Some(b'u') => value.checked_mul(u128::from(MSAT_PER_MICRO_BTC)).ok_or(Error::InvalidAmount)?,
		Some(b'm') => value.checked_mul(u128::from(MSAT_PER_MILLI_BTC)).ok_or(Error::InvalidAmount)?,
		Some(_) => unreachable!(),
		None => value.checked_mul(u128::from(MSAT_PER_BTC)).ok_or(Error::InvalidAmount)?,
	};

	u64::try_from(msat).map_err(|_| Error::InvalidAmount)
}

/// Parses an HRP amount suffix into satoshis. Sub-satoshi amounts are
/// rejected; use [`prefix_to_msat`] for those.
pub fn prefix_to_sat(prefix: &str) -> Result<u64, Error> {
	let msat = prefix_to_msat(prefix)?;
	if msat % 1000 != 0 {
		return Err(Error::InvalidAmount);
	}
	Ok(msat / 1000)
}
