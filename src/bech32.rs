//! Bech32 primitives used by the invoice encoding.
//!
//! BOLT11 reuses the BIP-173 character set and checksum but drops the 90
//! character length limit, so this module implements the codec directly
//! instead of delegating to an address-oriented library. Data is handled as
//! "words", 5-bit unsigned integers stored in `u8`s.

use crate::Error;

/// The bech32 character set, indexed by word value.
pub(crate) const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Maps ASCII characters back to word values. `-1` marks characters outside
/// the character set; uppercase letters are deliberately invalid so that
/// mixed-case strings fail to parse.
const CHARSET_REV: [i8; 128] = [
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	15, -1, 10, 17, 21, 20, 26, 30,  7,  5, -1, -1, -1, -1, -1, -1,
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
	-1, 29, -1, 24, 13, 25,  9,  8, 23, -1, 18, 22, 31, 27, 19, -1,
	 1,  0,  3, 16, 11, 28, 12, 14,  6,  4,  2, -1, -1, -1, -1, -1,
];

/// One round of the BIP-173 checksum LFSR.
fn polymod_step(pre: u32) -> u32 {
	let b = pre >> 25;
	((pre & 0x1ff_ffff) << 5)
		^ (if b & 1 != 0 { 0x3b6a_57b2 } else { 0 })
		^ (if b & 2 != 0 { 0x2650_8e6d } else { 0 })
		^ (if b & 4 != 0 { 0x1ea1_19fa } else { 0 })
		^ (if b & 8 != 0 { 0x3d42_33dd } else { 0 })
		^ (if b & 16 != 0 { 0x2a14_62b3 } else { 0 })
}

/// Runs the checksum over the expanded HRP followed by `data`.
fn polymod_hrp_data(hrp: &str, data: &[u8]) -> u32 {
	let mut chk = 1u32;
	for b in hrp.bytes() {
		chk = polymod_step(chk) ^ u32::from(b >> 5);
	}
	chk = polymod_step(chk);
	for b in hrp.bytes() {
		chk = polymod_step(chk) ^ u32::from(b & 0x1f);
	}
	for &word in data {
		chk = polymod_step(chk) ^ u32::from(word);
	}
	chk
}

fn verify_checksum(hrp: &str, data: &[u8]) -> bool {
	polymod_hrp_data(hrp, data) == 1
}

fn create_checksum(hrp: &str, data: &[u8]) -> [u8; 6] {
	let mut chk = polymod_hrp_data(hrp, data);
	for _ in 0..6 {
		chk = polymod_step(chk);
	}
	chk ^= 1;

	let mut checksum = [0u8; 6];
	for (i, word) in checksum.iter_mut().enumerate() {
		*word = ((chk >> ((5 - i) * 5)) & 0x1f) as u8;
	}
	checksum
}

/// Encodes `data` words under the given HRP, appending the six checksum
/// words. The output is always lowercase.
pub(crate) fn encode(hrp: &str, data: &[u8]) -> String {
	let checksum = create_checksum(hrp, data);

	let mut encoded = String::with_capacity(hrp.len() + 1 + data.len() + 6);
	encoded.push_str(hrp);
	encoded.push('1');
	for &word in data.iter().chain(checksum.iter()) {
		encoded.push(char::from(CHARSET[word as usize]));
	}
	encoded
}

/// Splits a bech32 string into its HRP and data words, verifying and
/// stripping the checksum.
///
/// Fully uppercase input is folded to lowercase first. Mixed-case strings are
/// left untouched and die either on the character-set lookup (uppercase data
/// characters) or on the checksum (uppercase HRP characters).
pub(crate) fn decode(s: &str) -> Result<(String, Vec<u8>), Error> {
	let lowered;
	let s = if s.bytes().any(|b| b.is_ascii_uppercase())
		&& !s.bytes().any(|b| b.is_ascii_lowercase())
	{
		lowered = s.to_ascii_lowercase();
		&lowered
	} else {
		s
	};

	let separator = s.rfind('1').ok_or(Error::InvalidInvoice("missing bech32 separator"))?;
	let (hrp, data_str) = (&s[..separator], &s[separator + 1..]);
	if hrp.is_empty() {
		return Err(Error::InvalidInvoice("empty human-readable part"));
	}

	let mut data = Vec::with_capacity(data_str.len());
	for b in data_str.bytes() {
		let word = if b < 128 { CHARSET_REV[b as usize] } else { -1 };
		if word < 0 {
			return Err(Error::InvalidInvoice("invalid bech32 character"));
		}
		data.push(word as u8);
	}

	if data.len() < 6 || !verify_checksum(hrp, &data) {
		return Err(Error::InvalidChecksum);
	}
	data.truncate(data.len() - 6);

	Ok((hrp.to_owned(), data))
}

/// Packs bytes into words, zero-padding the final word if the bit count is
/// not a multiple of five.
pub(crate) fn bytes_to_words(bytes: &[u8]) -> Vec<u8> {
	let mut words = Vec::with_capacity((bytes.len() * 8 + 4) / 5);
	let mut buffer = 0u32;
	let mut bits = 0;
	for &byte in bytes {
		buffer = (buffer << 8) | u32::from(byte);
		bits += 8;
		while bits >= 5 {
			bits -= 5;
			words.push(((buffer >> bits) & 0x1f) as u8);
		}
	}
	if bits > 0 {
		words.push(((buffer << (5 - bits)) & 0x1f) as u8);
	}
	words
}

/// Unpacks words into bytes, zero-extending a trailing partial byte. This is
/// the form hashed when signing: the preimage must cover every bit that was
/// transmitted.
pub(crate) fn words_to_bytes_padded(words: &[u8]) -> Vec<u8> {
	let mut bytes = Vec::with_capacity((words.len() * 5 + 7) / 8);
	let mut buffer = 0u32;
	let mut bits = 0;
	for &word in words {
		buffer = (buffer << 5) | u32::from(word);
		bits += 5;
		while bits >= 8 {
			bits -= 8;
			bytes.push(((buffer >> bits) & 0xff) as u8);
		}
	}
	if bits > 0 {
		bytes.push(((buffer << (8 - bits)) & 0xff) as u8);
	}
	bytes
}

/// Unpacks words into bytes, discarding bits left over after the last full
/// byte. Tag payloads with fixed lengths are aligned such that only padding
/// is dropped.
pub(crate) fn words_to_bytes_trim(words: &[u8]) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(words.len() * 5 / 8);
	let mut buffer = 0u32;
	let mut bits = 0;
	for &word in words {
		buffer = (buffer << 5) | u32::from(word);
		bits += 5;
		while bits >= 8 {
			bits -= 8;
			bytes.push(((buffer >> bits) & 0xff) as u8);
		}
	}
	bytes
}

/// Writes `n` as exactly `count` big-endian words, truncating high bits that
/// do not fit.
pub(crate) fn int_to_words_fixed(n: u64, count: usize) -> Vec<u8> {
	(0..count).rev().map(|i| ((n >> (5 * i)) & 0x1f) as u8).collect()
}

/// Writes `n` as the minimum number of big-endian words, at least one.
pub(crate) fn int_to_words_min(n: u64) -> Vec<u8> {
	let mut count = 1;
	while count < 13 && n >> (5 * count) != 0 {
		count += 1;
	}
	int_to_words_fixed(n, count)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn charset_tables_agree() {
		for (value, &c) in CHARSET.iter().enumerate() {
			assert_eq!(CHARSET_REV[c as usize], value as i8);
		}
		assert_eq!(CHARSET_REV.iter().filter(|&&v| v >= 0).count(), 32);
	}

	#[test]
	fn encode_known_vectors() {
		// BIP-173 vectors: an empty data part and a P2WPKH address.
		assert_eq!(encode("a", &[]), "a12uel5l");

		let program = [
			0x75, 0x1e, 0x76, 0xe8, 0x19, 0x91, 0x96, 0xd4, 0x54, 0x94,
			0x1c, 0x45, 0xd1, 0xb3, 0xa3, 0x23, 0xf1, 0x43, 0x3b, 0xd6,
		];
		let mut data = vec![0];
		data.extend(bytes_to_words(&program));
		assert_eq!(encode("bc", &data), "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
	}

	#[test]
	fn decode_round_trip() {
		let data = vec![0, 1, 2, 3, 31, 30, 29, 15, 16, 17];
		let encoded = encode("lnbc", &data);
		assert_eq!(decode(&encoded).unwrap(), ("lnbc".to_owned(), data));
	}

	#[test]
	fn decode_accepts_uppercase_only() {
		let encoded = encode("lnbc", &[1, 2, 3]);
		let upper = encoded.to_ascii_uppercase();
		assert_eq!(decode(&upper).unwrap(), decode(&encoded).unwrap());
	}

	#[test]
	fn decode_rejects_mixed_case() {
		let encoded = encode("lnbc", &[1, 2, 3]);
		// Uppercase one data character only; words 1, 2, 3 render as "pzr".
		assert_eq!(&encoded[5..8], "pzr");
		let mixed = format!("{}P{}", &encoded[..5], &encoded[6..]);
		assert_eq!(decode(&mixed), Err(Error::InvalidInvoice("invalid bech32 character")));

		// Uppercase the HRP only: characters stay decodable but the checksum
		// no longer matches.
		let encoded = encode("lnbc", &[1, 2, 3]);
		let mixed = format!("LNBC{}", &encoded[4..]);
		assert_eq!(decode(&mixed), Err(Error::InvalidChecksum));
	}

	#[test]
	fn decode_rejects_damage() {
		assert_eq!(
			decode("pzry9x0s3jn54khce6mua7l"),
			Err(Error::InvalidInvoice("missing bech32 separator"))
		);
		assert_eq!(
			decode("1qzzfhee"),
			Err(Error::InvalidInvoice("empty human-readable part"))
		);
		assert_eq!(
			decode("lnbc1b2uel5l"),
			Err(Error::InvalidInvoice("invalid bech32 character"))
		);
		assert_eq!(decode("a12uel"), Err(Error::InvalidChecksum));

		let mut encoded = encode("lnbc", &[1, 2, 3]);
		let last = encoded.pop().unwrap();
		encoded.push(if last == 'q' { 'p' } else { 'q' });
		assert_eq!(decode(&encoded), Err(Error::InvalidChecksum));
	}

	#[test]
	fn bit_reshuffling() {
		assert_eq!(bytes_to_words(&[0xff]), vec![31, 28]);
		assert_eq!(words_to_bytes_trim(&[31, 28]), vec![0xff]);
		assert_eq!(words_to_bytes_padded(&[31, 28]), vec![0xff, 0x00]);

		// Five bytes are exactly eight words; no padding in either direction.
		let bytes = [0x01, 0x02, 0x03, 0x04, 0x05];
		let words = bytes_to_words(&bytes);
		assert_eq!(words.len(), 8);
		assert_eq!(words_to_bytes_trim(&words), bytes.to_vec());
		assert_eq!(words_to_bytes_padded(&words), bytes.to_vec());

		for len in 1..=20 {
			let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
			assert_eq!(words_to_bytes_trim(&bytes_to_words(&bytes)), bytes);
		}
	}

	#[test]
	fn integer_words() {
		assert_eq!(int_to_words_min(0), vec![0]);
		assert_eq!(int_to_words_min(31), vec![31]);
		assert_eq!(int_to_words_min(32), vec![1, 0]);
		assert_eq!(int_to_words_min(60), vec![1, 28]);
		assert_eq!(int_to_words_min(604800), vec![18, 14, 20, 0]);
		assert_eq!(int_to_words_fixed(1, 7), vec![0, 0, 0, 0, 0, 0, 1]);
		assert_eq!(int_to_words_fixed(1496314658, 7), vec![1, 12, 18, 31, 28, 25, 2]);
	}
}
