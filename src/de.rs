//! Parsing of payment request strings back into invoices.

use std::convert::TryInto;
use std::str::FromStr;

use num_traits::{CheckedAdd, CheckedMul, Zero};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1};

use crate::features::Features;
use crate::{amount, bech32, constants};
use crate::{
	Error, FallbackAddress, Invoice, Network, PositiveTimestamp, RawDataPart, RawHrp, RawInvoice,
	RouteHop, Tag, SIGNATURE_WORDS, TIMESTAMP_WORDS,
};

/// Network prefixes, longest first so that `bcrt` wins over `bc` and `tbs`
/// over `tb`.
const NETWORK_PREFIXES: [(&str, Network); 4] = [
	("bcrt", Network::Regtest),
	("tbs", Network::Signet),
	("tb", Network::Testnet),
	("bc", Network::Bitcoin),
];

/// Parses a payment request string into an [`Invoice`]. Equivalent to
/// `payment_request.parse()`.
pub fn decode(payment_request: &str) -> Result<Invoice, Error> {
	payment_request.parse()
}

impl FromStr for Invoice {
	type Err = Error;

	fn from_str(s: &str) -> Result<Invoice, Error> {
		let (hrp, data) = bech32::decode(s)?;
		if data.len() < TIMESTAMP_WORDS + SIGNATURE_WORDS {
			return Err(Error::InvalidInvoice("data part too short to hold a timestamp and signature"));
		}
		let (network, amount_msat) = parse_hrp(&hrp)?;

		let (data_part, signature_part) = data.split_at(data.len() - SIGNATURE_WORDS);
		let timestamp = parse_int_be(&data_part[..TIMESTAMP_WORDS], 32u64)
			.expect("seven words hold at most 35 bits");
		let tags = parse_tagged_fields(&data_part[TIMESTAMP_WORDS..])?;

		// 104 words are exactly 65 bytes: the compact signature and the
		// recovery flag.
		let signature_bytes = bech32::words_to_bytes_trim(signature_part);
		let signature: [u8; 64] = signature_bytes[..64].try_into().expect("slice length is 64");
		let recovery_flag = signature_bytes[64];
		if recovery_flag > 3 {
			return Err(Error::InvalidSignature);
		}

		// The signed digest covers the words as transmitted, including any
		// tags skipped above.
		let hash = crate::signed_data_hash(hrp.as_bytes(), data_part);

		let raw_invoice = RawInvoice {
			hrp: RawHrp { network, amount_msat },
			data: RawDataPart {
				timestamp: PositiveTimestamp::from_unix_timestamp(timestamp)
					.expect("seven words are at most 35 bits"),
				tags,
			},
		};

		// An explicitly tagged payee key is taken at face value; recovery is
		// only needed (and only fatal) without one.
		let payee_node_key = match raw_invoice.payee() {
			Some(payee) => *payee,
			None => recover_payee(&hash, &signature, recovery_flag)?,
		};

		Ok(Invoice::from_parts(
			raw_invoice,
			hash,
			signature,
			recovery_flag,
			payee_node_key,
			s.to_ascii_lowercase(),
		))
	}
}

fn parse_hrp(hrp: &str) -> Result<(Network, Option<u64>), Error> {
	let rest = if hrp.starts_with("ln") { &hrp[2..] } else { return Err(Error::UnsupportedNetwork) };

	let mut parsed = None;
	for (prefix, network) in NETWORK_PREFIXES.iter() {
		if rest.starts_with(prefix) {
			parsed = Some((network.clone(), &rest[prefix.len()..]));
			break;
		}
	}
	let (network, amount_str) = parsed.ok_or(Error::UnsupportedNetwork)?;

	let amount_msat =
		if amount_str.is_empty() { None } else { Some(amount::prefix_to_msat(amount_str)?) };
	Ok((network, amount_msat))
}

/// Reads a big-endian number from a slice of digits in an arbitrary base,
/// failing on overflow of the target type.
pub(crate) fn parse_int_be<T, U>(digits: &[U], base: T) -> Option<T>
	where T: CheckedAdd + CheckedMul + Zero + Copy, U: Into<T> + Copy
{
	digits.iter().fold(Some(T::zero()), |acc, digit| {
		acc.and_then(|x| x.checked_mul(&base)).and_then(|x| x.checked_add(&(*digit).into()))
	})
}

fn parse_tagged_fields(mut words: &[u8]) -> Result<Vec<Tag>, Error> {
	let mut tags = Vec::new();
	while !words.is_empty() {
		if words.len() < 3 {
			return Err(Error::InvalidInvoice("truncated tagged field header"));
		}
		let code = words[0];
		let length = words[1] as usize * 32 + words[2] as usize;
		if words.len() < 3 + length {
			return Err(Error::InvalidInvoice("tagged field extends past the end of the data"));
		}
		let data = &words[3..3 + length];
		words = &words[3 + length..];

		if let Some(tag) = parse_tag(code, data)? {
			tags.push(tag);
		}
	}
	Ok(tags)
}

/// Parses a single tagged field. `Ok(None)` means the field is skipped:
/// either its type code is unknown (readers must ignore those) or a
/// fixed-length payload had the wrong length.
fn parse_tag(code: u8, data: &[u8]) -> Result<Option<Tag>, Error> {
	let tag = match code {
		constants::TAG_PAYMENT_HASH => digest32(data).map(Tag::PaymentHash),
		constants::TAG_PAYMENT_SECRET => digest32(data).map(Tag::PaymentSecret),
		constants::TAG_DESCRIPTION => {
			let bytes = bech32::words_to_bytes_trim(data);
			let description = String::from_utf8(bytes)
				.map_err(|_| Error::InvalidInvoice("description is not valid UTF-8"))?;
			Some(Tag::Description(description))
		},
		constants::TAG_METADATA => Some(Tag::Metadata(bech32::words_to_bytes_trim(data))),
		constants::TAG_PAYEE => {
			if data.len() != 53 {
				None
			} else {
				PublicKey::from_slice(&bech32::words_to_bytes_trim(data)).ok().map(Tag::Payee)
			}
		},
		constants::TAG_DESCRIPTION_HASH => digest32(data).map(Tag::DescriptionHash),
		constants::TAG_EXPIRY => Some(Tag::Expiry(parse_tag_int(data)?)),
		constants::TAG_MIN_FINAL_CLTV_EXPIRY => Some(Tag::MinFinalCltvExpiry(parse_tag_int(data)?)),
		constants::TAG_FALLBACK_ADDRESS => {
			let (version, hash_words) =
				data.split_first().ok_or(Error::InvalidInvoice("empty fallback address"))?;
			Some(Tag::FallbackAddress(FallbackAddress {
				version: *version,
				hash: bech32::words_to_bytes_trim(hash_words),
			}))
		},
		constants::TAG_ROUTE_HINT => Some(Tag::RouteHint(parse_route_hint(data)?)),
		constants::TAG_FEATURES => Some(Tag::Features(Features::from_words(data.to_vec()))),
		_ => None,
	};
	Ok(tag)
}

/// Extracts a 32-byte digest payload. Payloads that are not the canonical 52
/// words are dropped, not rejected.
fn digest32(data: &[u8]) -> Option<[u8; 32]> {
	if data.len() != 52 {
		return None;
	}
	let bytes = bech32::words_to_bytes_trim(data);
	Some(bytes[..].try_into().expect("52 words trim to exactly 32 bytes"))
}

fn parse_tag_int(data: &[u8]) -> Result<u64, Error> {
	parse_int_be(data, 32u64).ok_or(Error::InvalidInvoice("integer tag overflows u64"))
}

/// Splits a route hint payload into 51-byte hops. A trailing chunk shorter
/// than one hop is ignored.
fn parse_route_hint(data: &[u8]) -> Result<Vec<RouteHop>, Error> {
	let bytes = bech32::words_to_bytes_trim(data);
	let mut hops = Vec::with_capacity(bytes.len() / 51);
	for hop in bytes.chunks_exact(51) {
		hops.push(RouteHop {
			pubkey: PublicKey::from_slice(&hop[..33])
				.map_err(|_| Error::InvalidInvoice("invalid route hint public key"))?,
			short_channel_id: parse_int_be(&hop[33..41], 256u64)
				.expect("eight bytes fit into u64"),
			fee_base_msat: parse_int_be(&hop[41..45], 256u32).expect("four bytes fit into u32"),
			fee_proportional_millionths: parse_int_be(&hop[45..49], 256u32)
				.expect("four bytes fit into u32"),
			cltv_expiry_delta: parse_int_be(&hop[49..51], 256u16).expect("two bytes fit into u16"),
		});
	}
	Ok(hops)
}

/// The order of the secp256k1 group, big-endian.
const CURVE_ORDER: [u8; 32] = [
	0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
	0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Half the curve order, rounded down. An `s` above this is a "high-S"
/// signature, which BIP 62 ruled out but historical invoices still carry.
const CURVE_ORDER_HALF: [u8; 32] = [
	0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
	0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// `n - s` over big-endian 32-byte scalars.
fn negate_scalar(s: &[u8; 32]) -> [u8; 32] {
	let mut negated = [0u8; 32];
	let mut borrow = 0i32;
	for i in (0..32).rev() {
		let difference = i32::from(CURVE_ORDER[i]) - i32::from(s[i]) - borrow;
		borrow = if difference < 0 { 1 } else { 0 };
		negated[i] = (difference & 0xff) as u8;
	}
	negated
}

/// Recovers the payee key from the signature over the invoice hash.
///
/// A high-S signature recovers to the intended key only after `s` is
/// normalized to `n - s` while keeping the transmitted recovery flag, so
/// normalization happens before the library sees the signature. The caller
/// keeps the original bytes for re-encoding.
pub(crate) fn recover_payee(
	hash: &[u8; 32], signature: &[u8; 64], recovery_flag: u8,
) -> Result<PublicKey, Error> {
	let message = Message::from_slice(&hash[..]).expect("the hash is exactly MESSAGE_SIZE bytes");
	let recovery_id =
		RecoveryId::from_i32(i32::from(recovery_flag)).map_err(|_| Error::InvalidSignature)?;

	let mut normalized = *signature;
	let s: [u8; 32] = signature[32..].try_into().expect("slice length is 32");
	if s > CURVE_ORDER_HALF {
		normalized[32..].copy_from_slice(&negate_scalar(&s));
	}

	let signature = RecoverableSignature::from_compact(&normalized, recovery_id)
		.map_err(|_| Error::InvalidSignature)?;
	Secp256k1::new().recover_ecdsa(&message, &signature).map_err(|_| Error::InvalidSignature)
}

/// Whether `s` exceeds half the curve order.
#[cfg(test)]
pub(crate) fn is_high_s(s: &[u8; 32]) -> bool {
	*s > CURVE_ORDER_HALF
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hrp_networks() {
		assert_eq!(parse_hrp("lnbc"), Ok((Network::Bitcoin, None)));
		assert_eq!(parse_hrp("lnbc2500u"), Ok((Network::Bitcoin, Some(250_000_000))));
		assert_eq!(parse_hrp("lntb20m"), Ok((Network::Testnet, Some(2_000_000_000))));
		assert_eq!(parse_hrp("lntbs1m"), Ok((Network::Signet, Some(100_000_000))));
		// `bcrt` must match before `bc` even though both are prefixes.
		assert_eq!(parse_hrp("lnbcrt15n"), Ok((Network::Regtest, Some(1_500))));

		assert_eq!(parse_hrp("bc20m"), Err(Error::UnsupportedNetwork));
		assert_eq!(parse_hrp("lnsb20m"), Err(Error::UnsupportedNetwork));
		assert_eq!(parse_hrp("ln"), Err(Error::UnsupportedNetwork));
		assert_eq!(parse_hrp("lnbc2500x"), Err(Error::InvalidAmount));
	}

	#[test]
	fn integer_parsing() {
		assert_eq!(parse_int_be(&[1u8, 12, 18, 31, 28, 25, 2], 32u64), Some(1496314658));
		assert_eq!(parse_int_be(&[1u8, 28], 32u64), Some(60));
		assert_eq!(parse_int_be(&[] as &[u8], 32u64), Some(0));
		assert_eq!(parse_int_be(&[0xffu8; 2], 256u16), Some(0xffff));
		// Fourteen words overflow a u64.
		assert_eq!(parse_int_be(&[31u8; 14], 32u64), None);
	}

	#[test]
	fn unknown_tags_are_skipped() {
		// Code 2 is unassigned; the expiry after it must still parse.
		let words = [2, 0, 3, 1, 2, 3, 6, 0, 1, 5];
		assert_eq!(parse_tagged_fields(&words), Ok(vec![Tag::Expiry(5)]));
	}

	#[test]
	fn wrong_length_digests_are_dropped() {
		let words = [1, 0, 2, 1, 2];
		assert_eq!(parse_tagged_fields(&words), Ok(vec![]));

		let mut words = vec![19, 1, 20];
		words.extend(vec![0; 52]);
		assert_eq!(parse_tagged_fields(&words), Ok(vec![]));
	}

	#[test]
	fn truncated_tags_are_errors() {
		assert_eq!(
			parse_tagged_fields(&[6, 0]),
			Err(Error::InvalidInvoice("truncated tagged field header"))
		);
		assert_eq!(
			parse_tagged_fields(&[6, 0, 5, 1]),
			Err(Error::InvalidInvoice("tagged field extends past the end of the data"))
		);
	}

	#[test]
	fn description_must_be_utf8() {
		let words = [13, 0, 4, 31, 31, 31, 16];
		assert_eq!(
			parse_tagged_fields(&words),
			Err(Error::InvalidInvoice("description is not valid UTF-8"))
		);
	}

	#[test]
	fn empty_fallback_is_an_error() {
		assert_eq!(
			parse_tagged_fields(&[9, 0, 0]),
			Err(Error::InvalidInvoice("empty fallback address"))
		);
	}

	#[test]
	fn scalar_negation() {
		let mut one = [0u8; 32];
		one[31] = 1;
		let mut order_minus_one = CURVE_ORDER;
		order_minus_one[31] -= 1;
		assert_eq!(negate_scalar(&one), order_minus_one);
		assert_eq!(negate_scalar(&order_minus_one), one);

		// Negation flips sides of the half-order boundary.
		assert!(!is_high_s(&CURVE_ORDER_HALF));
		assert!(is_high_s(&negate_scalar(&CURVE_ORDER_HALF)));
		let mut above_half = CURVE_ORDER_HALF;
		above_half[31] += 1;
		assert!(is_high_s(&above_half));
		assert!(!is_high_s(&negate_scalar(&above_half)));
	}
}
