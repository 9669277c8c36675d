//! Rendering of invoices into their bech32 wire form.

use std::fmt;
use std::fmt::{Display, Formatter};

use crate::{bech32, Invoice, RawHrp, RawInvoice, RouteHop, Tag};

/// Maximum number of data words a single tagged field can carry, as its
/// length is transmitted in two 5-bit words.
pub(crate) const MAX_TAG_WORDS: usize = 1023;

impl Display for RawHrp {
	fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
		write!(f, "ln{}", self.network.prefix())?;
		match self.amount_msat {
			Some(msat) => write!(f, "{}", crate::amount::msat_to_prefix(msat)),
			None => Ok(()),
		}
	}
}

impl Display for RawInvoice {
	/// Renders the unsigned form: human-readable part, timestamp and tagged
	/// fields, without the trailing signature words.
	fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
		f.write_str(&bech32::encode(&self.hrp.to_string(), &data_words(self)))
	}
}

impl Display for Invoice {
	fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
		f.write_str(self.payment_request())
	}
}

/// The signatureless data part: seven timestamp words followed by the tagged
/// fields in order.
pub(crate) fn data_words(raw: &RawInvoice) -> Vec<u8> {
	let mut words = bech32::int_to_words_fixed(raw.data.timestamp.as_unix_timestamp(), 7);
	for tag in &raw.data.tags {
		words.extend(tag_words(tag));
	}
	words
}

/// A whole tagged field: `[type, len / 32, len % 32]` followed by the
/// payload words.
pub(crate) fn tag_words(tag: &Tag) -> Vec<u8> {
	let mut data = tag_data_words(tag);
	// Oversize tags are rejected before signing or encoding; the clamp keeps
	// the length header words in the 5-bit range for `Display` on invoices
	// assembled by hand.
	data.truncate(MAX_TAG_WORDS);

	let mut words = Vec::with_capacity(3 + data.len());
	words.push(tag.code());
	words.push((data.len() / 32) as u8);
	words.push((data.len() % 32) as u8);
	words.extend(data);
	words
}

/// A tagged field's payload words, without the type and length header.
pub(crate) fn tag_data_words(tag: &Tag) -> Vec<u8> {
	match tag {
		Tag::PaymentHash(hash) => bech32::bytes_to_words(hash),
		Tag::PaymentSecret(secret) => bech32::bytes_to_words(secret),
		Tag::Description(description) => bech32::bytes_to_words(description.as_bytes()),
		Tag::Metadata(metadata) => bech32::bytes_to_words(metadata),
		Tag::Payee(pubkey) => bech32::bytes_to_words(&pubkey.serialize()),
		Tag::DescriptionHash(hash) => bech32::bytes_to_words(hash),
		Tag::Expiry(seconds) => bech32::int_to_words_min(*seconds),
		Tag::MinFinalCltvExpiry(delta) => bech32::int_to_words_min(*delta),
		Tag::FallbackAddress(fallback) => {
			// Versions above 31 are rejected before signing or encoding; the
			// mask keeps the word in range for `Display`.
			let mut words = vec![fallback.version & 0x1f];
			words.extend(bech32::bytes_to_words(&fallback.hash));
			words
		},
		Tag::RouteHint(hops) => {
			let mut bytes = Vec::with_capacity(hops.len() * 51);
			for hop in hops {
				write_route_hop(&mut bytes, hop);
			}
			bech32::bytes_to_words(&bytes)
		},
		Tag::Features(features) => features.words().to_vec(),
	}
}

/// Appends the 51-byte wire form of a route hop: pubkey, short channel id,
/// base fee, proportional fee and CLTV expiry delta, integers big-endian.
fn write_route_hop(bytes: &mut Vec<u8>, hop: &RouteHop) {
	bytes.extend_from_slice(&hop.pubkey.serialize());
	bytes.extend_from_slice(&hop.short_channel_id.to_be_bytes());
	bytes.extend_from_slice(&hop.fee_base_msat.to_be_bytes());
	bytes.extend_from_slice(&hop.fee_proportional_millionths.to_be_bytes());
	bytes.extend_from_slice(&hop.cltv_expiry_delta.to_be_bytes());
}

/// The trailing 104 signature words: the 64-byte compact signature and the
/// recovery flag, packed as one 65-byte buffer.
pub(crate) fn signature_words(signature: &[u8; 64], recovery_flag: u8) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(65);
	bytes.extend_from_slice(signature);
	bytes.push(recovery_flag);
	bech32::bytes_to_words(&bytes)
}

/// Assembles the final payment request string.
pub(crate) fn render_signed(raw: &RawInvoice, signature: &[u8; 64], recovery_flag: u8) -> String {
	let mut words = data_words(raw);
	words.extend(signature_words(signature, recovery_flag));
	bech32::encode(&raw.hrp.to_string(), &words)
}
