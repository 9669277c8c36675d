#![deny(broken_intra_doc_links)]
#![deny(private_intra_doc_links)]

#![deny(missing_docs)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#![cfg_attr(feature = "strict", deny(warnings))]

//! This crate provides data structures to represent
//! [lightning BOLT11](https://github.com/lightning/bolts/blob/master/11-payment-encoding.md)
//! invoices and functions to create, encode and decode these. If you just want to use the standard
//! en-/decoding functionality this should get you started:
//!
//!   * For parsing use `str::parse::<Invoice>(&self)` or the [`decode`] function
//!   * For constructing invoices use the [`InvoiceBuilder`], or [`RawInvoice::new`] when the tag
//!     list is already at hand
//!   * For serializing invoices use the [`Display`]/[`ToString`] traits

extern crate bitcoin_hashes;
extern crate num_traits;
extern crate secp256k1;
#[cfg(feature = "serde")]
extern crate serde;

pub mod amount;
pub mod features;

mod bech32;
mod de;
mod ser;
mod tb;

use bitcoin_hashes::{sha256, Hash};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use std::fmt::{self, Display, Formatter};
use std::marker::PhantomData;
use std::ops::Deref;

#[cfg(feature = "serde")]
use serde::{de::Error as DeserializeError, Deserialize, Deserializer, Serialize, Serializer};

pub use crate::de::decode;
pub use crate::features::{Feature, Features};

/// Errors this library surfaces to callers. Kinds are deliberately coarse;
/// the payload of [`Error::InvalidInvoice`] exists for debugging and should
/// generally reach users as just "invalid invoice".
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Error {
	/// The invoice (or invoice under construction) violates the BOLT11
	/// grammar: missing separator, truncated tagged field, missing required
	/// tag, out-of-range timestamp and similar.
	InvalidInvoice(&'static str),

	/// The bech32 checksum does not cover the string, or is cut short.
	InvalidChecksum,

	/// No recovery flag could be found while signing, or the signature of a
	/// decoded invoice has no recoverable public key and the invoice names
	/// no payee either.
	InvalidSignature,

	/// The amount in the human-readable part is empty, not a number, has a
	/// leading zero, uses an unknown multiplier or does not come to a whole
	/// number of millisatoshis (or satoshis, for the satoshi conversions).
	InvalidAmount,

	/// The human-readable part does not start with `ln` followed by a known
	/// network prefix.
	UnsupportedNetwork,
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Error::InvalidInvoice(detail) => write!(f, "malformed invoice: {}", detail),
			Error::InvalidChecksum => f.write_str("checksum does not cover the invoice"),
			Error::InvalidSignature => f.write_str("signature could not be produced or recovered"),
			Error::InvalidAmount => f.write_str("amount is empty, malformed or out of range"),
			Error::UnsupportedNetwork => f.write_str("human-readable part names no known network"),
		}
	}
}

impl std::error::Error for Error {}

/// The number of bits used to represent timestamps as defined in BOLT11.
const TIMESTAMP_BITS: usize = 35;

/// The number of 5-bit words a timestamp occupies on the wire.
pub(crate) const TIMESTAMP_WORDS: usize = TIMESTAMP_BITS / 5;

/// The number of 5-bit words the trailing signature and recovery flag occupy
/// on the wire.
pub(crate) const SIGNATURE_WORDS: usize = 104;

/// The maximum timestamp in seconds since the Unix epoch allowed by BOLT11.
pub const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;

/// Default expiry time in seconds, used when an invoice carries no `x` tag.
pub const DEFAULT_EXPIRY_TIME: u64 = 3600;

/// Default `min_final_cltv_expiry`, used when an invoice carries no `c` tag.
pub const DEFAULT_MIN_FINAL_CLTV_EXPIRY: u64 = 18;

/// Tag type codes as specified in BOLT11
#[allow(missing_docs)]
pub mod constants {
	pub const TAG_PAYMENT_HASH: u8 = 1;
	pub const TAG_ROUTE_HINT: u8 = 3;
	pub const TAG_FEATURES: u8 = 5;
	pub const TAG_EXPIRY: u8 = 6;
	pub const TAG_FALLBACK_ADDRESS: u8 = 9;
	pub const TAG_DESCRIPTION: u8 = 13;
	pub const TAG_PAYMENT_SECRET: u8 = 16;
	pub const TAG_PAYEE: u8 = 19;
	pub const TAG_DESCRIPTION_HASH: u8 = 23;
	pub const TAG_MIN_FINAL_CLTV_EXPIRY: u8 = 24;
	pub const TAG_METADATA: u8 = 27;
}

/// The network an invoice pays on, determining the HRP prefix after `ln`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Network {
	/// Bitcoin mainnet, `bc`
	Bitcoin,

	/// Bitcoin testnet, `tb`
	Testnet,

	/// Bitcoin signet, `tbs`
	Signet,

	/// Bitcoin regtest, `bcrt`
	Regtest,
}

impl Network {
	/// The HRP prefix of this network.
	pub fn prefix(&self) -> &'static str {
		match *self {
			Network::Bitcoin => "bc",
			Network::Testnet => "tb",
			Network::Signet => "tbs",
			Network::Regtest => "bcrt",
		}
	}
}

/// A timestamp in seconds since the Unix epoch that fits the 35 bits BOLT11
/// reserves for it.
///
/// # Invariants
///
/// The stored value is no greater than [`MAX_TIMESTAMP`].
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct PositiveTimestamp(u64);

impl PositiveTimestamp {
	/// Creates a `PositiveTimestamp` from a Unix timestamp in the range
	/// `0..=MAX_TIMESTAMP`.
	pub fn from_unix_timestamp(unix_seconds: u64) -> Result<Self, Error> {
		if unix_seconds <= MAX_TIMESTAMP {
			Ok(PositiveTimestamp(unix_seconds))
		} else {
			Err(Error::InvalidInvoice("timestamp does not fit into 35 bits"))
		}
	}

	/// Returns the Unix timestamp representing the stored time
	pub fn as_unix_timestamp(&self) -> u64 {
		self.0
	}
}

/// One hop of a private route hint: the channel to take towards the payee
/// and its fee and CLTV terms.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct RouteHop {
	/// Node at the start of the channel
	pub pubkey: PublicKey,
	/// Short channel id
	pub short_channel_id: u64,
	/// Base routing fee in millisatoshis
	pub fee_base_msat: u32,
	/// Proportional routing fee in parts per million
	pub fee_proportional_millionths: u32,
	/// CLTV difference the hop requires
	pub cltv_expiry_delta: u16,
}

/// An on-chain address the payer may fall back to, kept as the raw version
/// word (17 and 18 mark P2PKH and P2SH) and hash payload. Rendering it as an
/// address string is left to the caller.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct FallbackAddress {
	/// Version word, `0..=16` for segwit programs plus the two legacy marks
	pub version: u8,
	/// The hash or witness program
	pub hash: Vec<u8>,
}

/// A tagged field of an invoice.
///
/// Unknown tag codes encountered while parsing are skipped, so a decoded
/// invoice only ever holds these. Fields are kept in wire order and keep
/// that order when re-encoded.
#[allow(missing_docs)]
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Tag {
	PaymentHash([u8; 32]),
	PaymentSecret([u8; 32]),
	Description(String),
	Metadata(Vec<u8>),
	Payee(PublicKey),
	DescriptionHash([u8; 32]),
	Expiry(u64),
	MinFinalCltvExpiry(u64),
	FallbackAddress(FallbackAddress),
	RouteHint(Vec<RouteHop>),
	Features(Features),
}

impl Tag {
	/// Numeric representation of the field's tag
	pub fn code(&self) -> u8 {
		match *self {
			Tag::PaymentHash(_) => constants::TAG_PAYMENT_HASH,
			Tag::PaymentSecret(_) => constants::TAG_PAYMENT_SECRET,
			Tag::Description(_) => constants::TAG_DESCRIPTION,
			Tag::Metadata(_) => constants::TAG_METADATA,
			Tag::Payee(_) => constants::TAG_PAYEE,
			Tag::DescriptionHash(_) => constants::TAG_DESCRIPTION_HASH,
			Tag::Expiry(_) => constants::TAG_EXPIRY,
			Tag::MinFinalCltvExpiry(_) => constants::TAG_MIN_FINAL_CLTV_EXPIRY,
			Tag::FallbackAddress(_) => constants::TAG_FALLBACK_ADDRESS,
			Tag::RouteHint(_) => constants::TAG_ROUTE_HINT,
			Tag::Features(_) => constants::TAG_FEATURES,
		}
	}
}

/// Data of an invoice that is encoded in the human readable part
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct RawHrp {
	/// The network deferred from the characters after `ln`
	pub network: Network,

	/// The amount to pay, in millisatoshis
	pub amount_msat: Option<u64>,
}

/// Data of an invoice that is encoded in the data part
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct RawDataPart {
	/// generation time of the invoice
	pub timestamp: PositiveTimestamp,

	/// tagged fields of the payment request
	pub tags: Vec<Tag>,
}

/// Represents a syntactically correct invoice for a payment on the lightning
/// network, but without the signature information.
/// De- and encoding should not lead to information loss.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct RawInvoice {
	/// human readable part
	pub hrp: RawHrp,

	/// data part
	pub data: RawDataPart,
}

/// A signed, complete invoice: a [`RawInvoice`] together with its signature,
/// the payee key and the rendered payment request string.
///
/// There are three ways to construct an `Invoice`:
///  1. using [`InvoiceBuilder`]
///  2. signing a [`RawInvoice`] via [`RawInvoice::sign`] or
///     [`RawInvoice::with_signature`]
///  3. using `str::parse::<Invoice>(&str)`
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Invoice {
	raw: RawInvoice,

	/// Hash of the HRP and signatureless data part, the message that was
	/// signed. For parsed invoices this covers the words as received, which
	/// may include tags that were skipped while parsing.
	hash: [u8; 32],

	/// `r` and `s`, each 32 bytes big-endian. A high-S `s` is kept verbatim
	/// so that re-encoding reproduces the input.
	signature: [u8; 64],

	recovery_flag: u8,

	payee_node_key: PublicKey,

	payment_request: String,
}

/// Finds the first element of an enum stream of a given variant and extracts
/// one member of the variant. If no element was found `None` gets returned.
///
/// The following example would extract the first B.
///
/// ```ignore
/// enum Enum {
/// 	A(u8),
/// 	B(u16)
/// }
///
/// let elements = vec![Enum::A(1), Enum::A(2), Enum::B(3), Enum::A(4)];
///
/// assert_eq!(find_extract!(elements.iter(), Enum::B(x), x), Some(3u16));
/// ```
macro_rules! find_extract {
	($iter:expr, $enm:pat, $enm_var:ident) => {
		find_all_extract!($iter, $enm, $enm_var).next()
	};
}

/// Finds the all elements of an enum stream of a given variant and extracts
/// one member of the variant through an iterator.
///
/// The following example would extract all A.
///
/// ```ignore
/// enum Enum {
/// 	A(u8),
/// 	B(u16)
/// }
///
/// let elements = vec![Enum::A(1), Enum::A(2), Enum::B(3), Enum::A(4)];
///
/// assert_eq!(
/// 	find_all_extract!(elements.iter(), Enum::A(x), x).collect::<Vec<u8>>(),
/// 	vec![1u8, 2u8, 4u8]
/// );
/// ```
macro_rules! find_all_extract {
	($iter:expr, $enm:pat, $enm_var:ident) => {
		$iter.filter_map(|tag| match *tag {
			$enm => Some($enm_var),
			_ => None,
		})
	};
}

/// Hash the HRP as bytes and the signatureless data part, zero-padded to a
/// byte boundary. This is the message an invoice signature commits to.
pub(crate) fn signed_data_hash(hrp_bytes: &[u8], data_without_signature: &[u8]) -> [u8; 32] {
	let mut preimage = Vec::from(hrp_bytes);
	preimage.extend(bech32::words_to_bytes_padded(data_without_signature));

	let mut hash = [0u8; 32];
	hash.copy_from_slice(&sha256::Hash::hash(&preimage)[..]);
	hash
}

/// Checks that every tag can be framed on the wire: the payload must fit the
/// two-word length field and a fallback version must fit one word. All
/// `RawInvoice` fields are public, so these checks run again wherever the
/// tags reach the encoder, not only in the constructors.
fn check_tag_encoding(tags: &[Tag]) -> Result<(), Error> {
	for tag in tags {
		if let Tag::FallbackAddress(fallback) = tag {
			if fallback.version > 31 {
				return Err(Error::InvalidInvoice("fallback version does not fit five bits"));
			}
		}
		if ser::tag_data_words(tag).len() > ser::MAX_TAG_WORDS {
			return Err(Error::InvalidInvoice("tagged field too long to encode"));
		}
	}
	Ok(())
}

/// Checks the tag set an invoice is about to be built from: every tag must
/// be encodable and the required tags must be present.
fn check_tags(tags: &[Tag]) -> Result<(), Error> {
	check_tag_encoding(tags)?;

	let mut has_payment_hash = false;
	let mut has_payment_secret = false;
	let mut has_description = false;

	for tag in tags {
		match tag {
			Tag::PaymentHash(_) => has_payment_hash = true,
			Tag::PaymentSecret(_) => has_payment_secret = true,
			Tag::Description(_) | Tag::DescriptionHash(_) => has_description = true,
			_ => {},
		}
	}

	if !has_payment_hash {
		return Err(Error::InvalidInvoice("missing payment hash tag"));
	}
	if !has_payment_secret {
		return Err(Error::InvalidInvoice("missing payment secret tag"));
	}
	if !has_description {
		return Err(Error::InvalidInvoice("missing description or description hash tag"));
	}
	Ok(())
}

#[allow(missing_docs)]
impl RawInvoice {
	/// Assembles an unsigned invoice from its parts. The tag list must
	/// contain a payment hash, a payment secret and either a description or
	/// a description hash; it is encoded in the given order.
	pub fn new(
		network: Network, amount_msat: Option<u64>, timestamp: u64, tags: Vec<Tag>,
	) -> Result<RawInvoice, Error> {
		check_tags(&tags)?;
		Ok(RawInvoice {
			hrp: RawHrp { network, amount_msat },
			data: RawDataPart {
				timestamp: PositiveTimestamp::from_unix_timestamp(timestamp)?,
				tags,
			},
		})
	}

	/// Calculate the hash of the encoded `RawInvoice` which should be signed.
	pub fn signable_hash(&self) -> [u8; 32] {
		signed_data_hash(self.hrp.to_string().as_bytes(), &ser::data_words(self))
	}

	/// Signs the invoice with the given key. The signature is deterministic
	/// (RFC 6979) and low-S; the recovery flag is found by recovering a
	/// candidate key for each of the four flags and keeping the one that
	/// yields the signer's own key.
	///
	/// The tags are checked to be encodable first, as for hand-assembled
	/// invoices that did not pass through [`RawInvoice::new`].
	pub fn sign(self, secret_key: &SecretKey) -> Result<Invoice, Error> {
		check_tag_encoding(&self.data.tags)?;

		let secp_ctx = Secp256k1::new();
		let hash = self.signable_hash();
		let message = Message::from_slice(&hash[..])
			.expect("Hash is 32 bytes long, same as MESSAGE_SIZE");
		let (_, signature) =
			secp_ctx.sign_ecdsa_recoverable(&message, secret_key).serialize_compact();

		let public_key = PublicKey::from_secret_key(&secp_ctx, secret_key);
		let mut recovery_flag = None;
		for flag in 0..4u8 {
			if de::recover_payee(&hash, &signature, flag) == Ok(public_key) {
				recovery_flag = Some(flag);
				break;
			}
		}
		let recovery_flag = recovery_flag.ok_or(Error::InvalidSignature)?;

		let payee_node_key = match self.payee() {
			Some(payee) => *payee,
			None => public_key,
		};
		let payment_request = ser::render_signed(&self, &signature, recovery_flag);
		Ok(Invoice::from_parts(self, hash, signature, recovery_flag, payee_node_key, payment_request))
	}

	/// Attaches a signature produced elsewhere, given as the 64-byte compact
	/// form and the recovery flag. The payee key is recovered from it unless
	/// the invoice names one explicitly.
	pub fn with_signature(self, signature: &[u8; 64], recovery_flag: u8) -> Result<Invoice, Error> {
		check_tag_encoding(&self.data.tags)?;
		if recovery_flag > 3 {
			return Err(Error::InvalidSignature);
		}
		let hash = self.signable_hash();
		let payee_node_key = match self.payee() {
			Some(payee) => *payee,
			None => de::recover_payee(&hash, signature, recovery_flag)?,
		};
		let payment_request = ser::render_signed(&self, signature, recovery_flag);
		Ok(Invoice::from_parts(
			self, hash, *signature, recovery_flag, payee_node_key, payment_request,
		))
	}

	/// The tagged fields, in wire order.
	pub fn tags(&self) -> &[Tag] {
		&self.data.tags
	}

	pub fn network(&self) -> Network {
		self.hrp.network.clone()
	}

	/// Returns the amount if specified in the invoice as millisatoshis.
	pub fn amount_milli_satoshis(&self) -> Option<u64> {
		self.hrp.amount_msat
	}

	/// Returns the amount if specified in the invoice as whole satoshis.
	/// Sub-satoshi amounts yield `None`, see
	/// [`RawInvoice::amount_milli_satoshis`] for those.
	pub fn amount_satoshis(&self) -> Option<u64> {
		match self.hrp.amount_msat {
			Some(msat) if msat % 1000 == 0 => Some(msat / 1000),
			_ => None,
		}
	}

	/// The invoice's timestamp in seconds since the Unix epoch.
	pub fn timestamp(&self) -> u64 {
		self.data.timestamp.as_unix_timestamp()
	}

	pub fn payment_hash(&self) -> Option<&[u8; 32]> {
		find_extract!(self.data.tags.iter(), Tag::PaymentHash(ref x), x)
	}

	pub fn payment_secret(&self) -> Option<&[u8; 32]> {
		find_extract!(self.data.tags.iter(), Tag::PaymentSecret(ref x), x)
	}

	pub fn description(&self) -> Option<&str> {
		find_extract!(self.data.tags.iter(), Tag::Description(ref x), x).map(|s| s.as_str())
	}

	pub fn description_hash(&self) -> Option<&[u8; 32]> {
		find_extract!(self.data.tags.iter(), Tag::DescriptionHash(ref x), x)
	}

	pub fn metadata(&self) -> Option<&[u8]> {
		find_extract!(self.data.tags.iter(), Tag::Metadata(ref x), x).map(|m| &m[..])
	}

	/// The explicitly tagged payee key, if any.
	pub fn payee(&self) -> Option<&PublicKey> {
		find_extract!(self.data.tags.iter(), Tag::Payee(ref x), x)
	}

	/// The `x` tag's value, without the default applied.
	pub fn expiry_time(&self) -> Option<u64> {
		find_extract!(self.data.tags.iter(), Tag::Expiry(ref x), x).copied()
	}

	/// The `c` tag's value, without the default applied.
	pub fn min_final_cltv_expiry(&self) -> Option<u64> {
		find_extract!(self.data.tags.iter(), Tag::MinFinalCltvExpiry(ref x), x).copied()
	}

	pub fn fallback_addresses(&self) -> Vec<&FallbackAddress> {
		find_all_extract!(self.data.tags.iter(), Tag::FallbackAddress(ref x), x).collect()
	}

	pub fn route_hints(&self) -> Vec<&[RouteHop]> {
		find_all_extract!(self.data.tags.iter(), Tag::RouteHint(ref x), x)
			.map(|hops| &hops[..])
			.collect()
	}

	pub fn features(&self) -> Option<&Features> {
		find_extract!(self.data.tags.iter(), Tag::Features(ref x), x)
	}
}

impl Invoice {
	pub(crate) fn from_parts(
		raw: RawInvoice, hash: [u8; 32], signature: [u8; 64], recovery_flag: u8,
		payee_node_key: PublicKey, payment_request: String,
	) -> Invoice {
		Invoice { raw, hash, signature, recovery_flag, payee_node_key, payment_request }
	}

	/// The rendered invoice string, as parsed or as assembled while signing.
	/// Always lowercase.
	pub fn payment_request(&self) -> &str {
		&self.payment_request
	}

	/// The hash of the HRP and signatureless data part that the signature
	/// covers.
	pub fn signable_hash(&self) -> &[u8; 32] {
		&self.hash
	}

	/// The signature as `r` and `s`, each 32 bytes big-endian.
	pub fn signature(&self) -> &[u8; 64] {
		&self.signature
	}

	/// The recovery flag transmitted alongside the signature, `0..=3`.
	pub fn recovery_flag(&self) -> u8 {
		self.recovery_flag
	}

	/// The payee's key: the explicitly tagged one if the invoice carries
	/// one, otherwise the key recovered from the signature.
	pub fn payee_node_key(&self) -> &PublicKey {
		&self.payee_node_key
	}

	/// Returns the invoice's expiry time, or [`DEFAULT_EXPIRY_TIME`] if no
	/// `x` tag is present.
	pub fn expiry_time(&self) -> u64 {
		self.raw.expiry_time().unwrap_or(DEFAULT_EXPIRY_TIME)
	}

	/// Returns the invoice's `min_final_cltv_expiry`, or
	/// [`DEFAULT_MIN_FINAL_CLTV_EXPIRY`] if no `c` tag is present.
	pub fn min_final_cltv_expiry(&self) -> u64 {
		self.raw.min_final_cltv_expiry().unwrap_or(DEFAULT_MIN_FINAL_CLTV_EXPIRY)
	}

	/// The moment the invoice expires, in seconds since the Unix epoch.
	/// Saturates instead of overflowing for absurd expiry times.
	pub fn expires_at(&self) -> u64 {
		self.raw.timestamp().saturating_add(self.expiry_time())
	}

	/// Whether the expiry time would have passed at the given point in time,
	/// in seconds since the Unix epoch.
	pub fn would_expire(&self, at_time: u64) -> bool {
		self.expires_at() < at_time
	}

	/// Disassembles the invoice into its unsigned part, signature and
	/// recovery flag.
	pub fn into_parts(self) -> (RawInvoice, [u8; 64], u8) {
		(self.raw, self.signature, self.recovery_flag)
	}
}

impl Deref for Invoice {
	type Target = RawInvoice;

	fn deref(&self) -> &RawInvoice {
		&self.raw
	}
}

#[cfg(feature = "serde")]
impl Serialize for Invoice {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
		serializer.serialize_str(self.payment_request())
	}
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Invoice {
	fn deserialize<D>(deserializer: D) -> Result<Invoice, D::Error> where D: Deserializer<'de> {
		let bolt11 = String::deserialize(deserializer)?
			.parse::<Invoice>()
			.map_err(|e| D::Error::custom(format!("{:?}", e)))?;

		Ok(bolt11)
	}
}

/// Builder for [`Invoice`]s. It's the most convenient and advised way to use this library. It
/// ensures that only a semantically and syntactically correct invoice can be built using it.
///
/// ```
/// use secp256k1::SecretKey;
///
/// use bolt11::{InvoiceBuilder, Network};
///
/// let private_key = SecretKey::from_slice(
/// 	&[
/// 		0xe1, 0x26, 0xf6, 0x8f, 0x7e, 0xaf, 0xcc, 0x8b, 0x74, 0xf5, 0x4d, 0x26, 0x9f,
/// 		0xe2, 0x06, 0xbe, 0x71, 0x50, 0x00, 0xf9, 0x4d, 0xac, 0x06, 0x7d, 0x1c, 0x04,
/// 		0xa8, 0xca, 0x3b, 0x2d, 0xb7, 0x34
/// 	][..]
/// ).unwrap();
///
/// let invoice = InvoiceBuilder::new(Network::Bitcoin)
/// 	.description("Coins pls!".into())
/// 	.payment_hash([0; 32])
/// 	.payment_secret([42; 32])
/// 	.current_timestamp()
/// 	.min_final_cltv_expiry(144)
/// 	.build_signed(&private_key)
/// 	.unwrap();
///
/// assert!(invoice.to_string().starts_with("lnbc1"));
/// ```
///
/// # Type parameters
/// The four parameters signal if the builder already contains the correct amount of the
/// given field:
///  * `D`: exactly one [`Tag::Description`] or [`Tag::DescriptionHash`]
///  * `H`: exactly one [`Tag::PaymentHash`]
///  * `T`: the timestamp is set
///  * `S`: exactly one [`Tag::PaymentSecret`]
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InvoiceBuilder<D: tb::Bool, H: tb::Bool, T: tb::Bool, S: tb::Bool> {
	network: Network,
	amount_msat: Option<u64>,
	timestamp: Option<PositiveTimestamp>,
	tags: Vec<Tag>,
	error: Option<Error>,

	phantom_d: PhantomData<D>,
	phantom_h: PhantomData<H>,
	phantom_t: PhantomData<T>,
	phantom_s: PhantomData<S>,
}

impl InvoiceBuilder<tb::False, tb::False, tb::False, tb::False> {
	/// Construct new, empty `InvoiceBuilder`. All necessary fields have to be filled first before
	/// `InvoiceBuilder::build_raw(self)` becomes available.
	pub fn new(network: Network) -> Self {
		InvoiceBuilder {
			network,
			amount_msat: None,
			timestamp: None,
			tags: Vec::new(),
			error: None,

			phantom_d: PhantomData,
			phantom_h: PhantomData,
			phantom_t: PhantomData,
			phantom_s: PhantomData,
		}
	}
}

impl<D: tb::Bool, H: tb::Bool, T: tb::Bool, S: tb::Bool> InvoiceBuilder<D, H, T, S> {
	/// Helper function to set the completeness flags.
	fn set_flags<DN: tb::Bool, HN: tb::Bool, TN: tb::Bool, SN: tb::Bool>(
		self,
	) -> InvoiceBuilder<DN, HN, TN, SN> {
		InvoiceBuilder::<DN, HN, TN, SN> {
			network: self.network,
			amount_msat: self.amount_msat,
			timestamp: self.timestamp,
			tags: self.tags,
			error: self.error,

			phantom_d: PhantomData,
			phantom_h: PhantomData,
			phantom_t: PhantomData,
			phantom_s: PhantomData,
		}
	}

	/// Sets the amount in millisatoshis.
	pub fn amount_milli_satoshis(mut self, amount_msat: u64) -> Self {
		self.amount_msat = Some(amount_msat);
		self
	}

	/// Sets the amount in satoshis.
	pub fn amount_satoshis(mut self, amount_sat: u64) -> Self {
		match amount_sat.checked_mul(1000) {
			Some(amount_msat) => self.amount_msat = Some(amount_msat),
			None => self.error = Some(Error::InvalidAmount),
		}
		self
	}

	/// Sets the payee's public key.
	pub fn payee(mut self, pub_key: PublicKey) -> Self {
		self.tags.push(Tag::Payee(pub_key));
		self
	}

	/// Sets the expiry time in seconds.
	pub fn expiry_time(mut self, expiry_time: u64) -> Self {
		self.tags.push(Tag::Expiry(expiry_time));
		self
	}

	/// Sets `min_final_cltv_expiry`.
	pub fn min_final_cltv_expiry(mut self, delta: u64) -> Self {
		self.tags.push(Tag::MinFinalCltvExpiry(delta));
		self
	}

	/// Adds a fallback address.
	pub fn fallback_address(mut self, fallback: FallbackAddress) -> Self {
		self.tags.push(Tag::FallbackAddress(fallback));
		self
	}

	/// Adds a private route hint.
	pub fn route_hint(mut self, hops: Vec<RouteHop>) -> Self {
		self.tags.push(Tag::RouteHint(hops));
		self
	}

	/// Attaches payment metadata, passed back opaquely inside the payment
	/// onion.
	pub fn metadata(mut self, metadata: Vec<u8>) -> Self {
		self.tags.push(Tag::Metadata(metadata));
		self
	}

	/// Attaches a feature field. [`InvoiceBuilder::payment_secret`] adds one
	/// automatically, so this is only needed for non-standard bit sets.
	pub fn features(mut self, features: Features) -> Self {
		self.tags.push(Tag::Features(features));
		self
	}
}

impl<H: tb::Bool, T: tb::Bool, S: tb::Bool> InvoiceBuilder<tb::False, H, T, S> {
	/// Set the description. This function is only available if no description (hash) was set.
	pub fn description(mut self, description: String) -> InvoiceBuilder<tb::True, H, T, S> {
		self.tags.push(Tag::Description(description));
		self.set_flags()
	}

	/// Set the description hash. This function is only available if no description (hash) was set.
	pub fn description_hash(mut self, hash: [u8; 32]) -> InvoiceBuilder<tb::True, H, T, S> {
		self.tags.push(Tag::DescriptionHash(hash));
		self.set_flags()
	}
}

impl<D: tb::Bool, T: tb::Bool, S: tb::Bool> InvoiceBuilder<D, tb::False, T, S> {
	/// Set the payment hash. This function is only available if no payment hash was set.
	pub fn payment_hash(mut self, hash: [u8; 32]) -> InvoiceBuilder<D, tb::True, T, S> {
		self.tags.push(Tag::PaymentHash(hash));
		self.set_flags()
	}
}

impl<D: tb::Bool, H: tb::Bool, S: tb::Bool> InvoiceBuilder<D, H, tb::False, S> {
	/// Sets the timestamp in seconds since the Unix epoch.
	pub fn timestamp(mut self, unix_seconds: u64) -> InvoiceBuilder<D, H, tb::True, S> {
		match PositiveTimestamp::from_unix_timestamp(unix_seconds) {
			Ok(t) => self.timestamp = Some(t),
			Err(e) => self.error = Some(e),
		}

		self.set_flags()
	}

	/// Sets the timestamp to the current system time.
	pub fn current_timestamp(mut self) -> InvoiceBuilder<D, H, tb::True, S> {
		let now = std::time::SystemTime::now()
			.duration_since(std::time::SystemTime::UNIX_EPOCH)
			.expect("for the foreseeable future this shouldn't happen");
		self.timestamp = Some(
			PositiveTimestamp::from_unix_timestamp(now.as_secs())
				.expect("for the foreseeable future this shouldn't happen"),
		);
		self.set_flags()
	}
}

impl<D: tb::Bool, H: tb::Bool, T: tb::Bool> InvoiceBuilder<D, H, T, tb::False> {
	/// Sets the payment secret, along with the feature bits every modern
	/// invoice advertises with it.
	pub fn payment_secret(mut self, payment_secret: [u8; 32]) -> InvoiceBuilder<D, H, T, tb::True> {
		let mut features = Features::empty();
		features.set_required(Feature::VariableLengthOnion);
		features.set_required(Feature::PaymentSecret);
		self.tags.push(Tag::PaymentSecret(payment_secret));
		self.tags.push(Tag::Features(features));
		self.set_flags()
	}
}

impl<D: tb::Bool, H: tb::Bool, T: tb::Bool> InvoiceBuilder<D, H, T, tb::True> {
	/// Sets the `basic_mpp` feature as optional.
	pub fn basic_mpp(mut self) -> Self {
		for tag in self.tags.iter_mut() {
			if let Tag::Features(features) = tag {
				features.set_optional(Feature::BasicMpp);
			}
		}
		self
	}
}

impl InvoiceBuilder<tb::True, tb::True, tb::True, tb::True> {
	/// Builds a [`RawInvoice`] if no error occurred while constructing any of its fields.
	pub fn build_raw(self) -> Result<RawInvoice, Error> {
		if let Some(e) = self.error {
			return Err(e);
		}

		let timestamp = self.timestamp.expect("ensured to be Some(t) by type T");
		check_tags(&self.tags)?;

		Ok(RawInvoice {
			hrp: RawHrp { network: self.network, amount_msat: self.amount_msat },
			data: RawDataPart { timestamp, tags: self.tags },
		})
	}

	/// Builds the invoice and signs it with the given key.
	pub fn build_signed(self, secret_key: &SecretKey) -> Result<Invoice, Error> {
		self.build_raw()?.sign(secret_key)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::convert::TryInto;
	use std::str::FromStr;

	fn test_secret_key() -> SecretKey {
		SecretKey::from_slice(
			&[
				0xe1, 0x26, 0xf6, 0x8f, 0x7e, 0xaf, 0xcc, 0x8b, 0x74, 0xf5, 0x4d, 0x26, 0x9f, 0xe2,
				0x06, 0xbe, 0x71, 0x50, 0x00, 0xf9, 0x4d, 0xac, 0x06, 0x7d, 0x1c, 0x04, 0xa8, 0xca,
				0x3b, 0x2d, 0xb7, 0x34
			][..]
		).unwrap()
	}

	fn hash32(hex_str: &str) -> [u8; 32] {
		hex::decode(hex_str).unwrap()[..].try_into().unwrap()
	}

	fn donation_invoice() -> RawInvoice {
		RawInvoice {
			hrp: RawHrp {
				network: Network::Bitcoin,
				amount_msat: None,
			},
			data: RawDataPart {
				timestamp: PositiveTimestamp::from_unix_timestamp(1496314658).unwrap(),
				tags: vec![
					Tag::PaymentHash(hash32(
						"0001020304050607080900010203040506070809000102030405060708090102"
					)),
					Tag::Description("Please consider supporting this project".to_owned()),
				],
			},
		}
	}

	#[test]
	fn test_timestamp_bounds() {
		assert_eq!(
			PositiveTimestamp::from_unix_timestamp(MAX_TIMESTAMP + 1),
			Err(Error::InvalidInvoice("timestamp does not fit into 35 bits"))
		);
		assert_eq!(
			PositiveTimestamp::from_unix_timestamp(MAX_TIMESTAMP).map(|t| t.as_unix_timestamp()),
			Ok(MAX_TIMESTAMP)
		);
	}

	#[test]
	fn test_calc_invoice_hash() {
		let expected_hash = [
			0xc3, 0xd4, 0xe8, 0x3f, 0x64, 0x6f, 0xa7, 0x9a, 0x39, 0x3d, 0x75, 0x27, 0x7b, 0x1d,
			0x85, 0x8d, 0xb1, 0xd1, 0xf7, 0xab, 0x71, 0x37, 0xdc, 0xb7, 0x83, 0x5d, 0xb2, 0xec,
			0xd5, 0x18, 0xe1, 0xc9
		];

		assert_eq!(donation_invoice().signable_hash(), expected_hash)
	}

	#[test]
	fn test_sign_discovers_recovery_flag() {
		let secret_key = test_secret_key();
		let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);

		let invoice = donation_invoice().sign(&secret_key).unwrap();
		assert!(invoice.recovery_flag() < 4);
		assert_eq!(invoice.payee_node_key(), &public_key);

		// BIP 62: the signer never produces a high-S signature.
		let s: [u8; 32] = invoice.signature()[32..].try_into().unwrap();
		assert!(!de::is_high_s(&s));
	}

	#[test]
	fn test_signed_round_trip() {
		let secret_key = test_secret_key();
		let invoice = donation_invoice().sign(&secret_key).unwrap();

		let reparsed = Invoice::from_str(invoice.payment_request()).unwrap();
		assert_eq!(reparsed, invoice);
	}

	#[test]
	fn test_required_tags() {
		let payment_hash = Tag::PaymentHash([0; 32]);
		let payment_secret = Tag::PaymentSecret([1; 32]);
		let description = Tag::Description("Test".to_owned());

		assert_eq!(
			RawInvoice::new(Network::Bitcoin, None, 1234567, vec![
				payment_secret.clone(), description.clone()
			]),
			Err(Error::InvalidInvoice("missing payment hash tag"))
		);
		assert_eq!(
			RawInvoice::new(Network::Bitcoin, None, 1234567, vec![
				payment_hash.clone(), description.clone()
			]),
			Err(Error::InvalidInvoice("missing payment secret tag"))
		);
		assert_eq!(
			RawInvoice::new(Network::Bitcoin, None, 1234567, vec![
				payment_hash.clone(), payment_secret.clone()
			]),
			Err(Error::InvalidInvoice("missing description or description hash tag"))
		);
		assert!(RawInvoice::new(Network::Bitcoin, None, 1234567, vec![
			payment_hash, payment_secret, description
		]).is_ok());
	}

	#[test]
	fn test_tag_length_limit() {
		// 13 hops serialize to 663 bytes, too long for the two-word length
		// field.
		let hop = RouteHop {
			pubkey: PublicKey::from_secret_key(&Secp256k1::new(), &test_secret_key()),
			short_channel_id: 0x0102030405060708,
			fee_base_msat: 1,
			fee_proportional_millionths: 20,
			cltv_expiry_delta: 3,
		};
		let tags = vec![
			Tag::PaymentHash([0; 32]),
			Tag::PaymentSecret([1; 32]),
			Tag::Description("Test".to_owned()),
			Tag::RouteHint(vec![hop; 13]),
		];
		assert_eq!(
			RawInvoice::new(Network::Bitcoin, None, 1234567, tags),
			Err(Error::InvalidInvoice("tagged field too long to encode"))
		);
	}

	#[test]
	fn test_hand_built_invoices_are_validated() {
		// Struct literals can bypass `RawInvoice::new`; signing and attaching
		// a signature still run the encodability checks instead of handing
		// out-of-range words to the renderer.
		let mut invoice = donation_invoice();
		invoice.data.tags.push(Tag::FallbackAddress(FallbackAddress {
			version: 200,
			hash: vec![0; 20],
		}));

		assert_eq!(
			invoice.clone().sign(&test_secret_key()),
			Err(Error::InvalidInvoice("fallback version does not fit five bits"))
		);
		assert_eq!(
			invoice.clone().with_signature(&[1; 64], 0),
			Err(Error::InvalidInvoice("fallback version does not fit five bits"))
		);

		let mut invoice = donation_invoice();
		invoice.data.tags.push(Tag::Metadata(vec![0; 1024]));
		assert_eq!(
			invoice.sign(&test_secret_key()),
			Err(Error::InvalidInvoice("tagged field too long to encode"))
		);
	}

	#[test]
	fn test_hand_built_invoices_render_without_panicking() {
		let mut invoice = donation_invoice();
		invoice.data.tags.push(Tag::FallbackAddress(FallbackAddress {
			version: 200,
			hash: vec![0; 20],
		}));
		invoice.data.tags.push(Tag::Metadata(vec![0; 1024]));

		// `Display` cannot return an error, so invalid words are clamped
		// instead; the output is still well-formed bech32.
		let rendered = invoice.to_string();
		assert!(rendered.starts_with("lnbc1"));
	}

	#[test]
	fn test_duplicate_tags_first_wins() {
		let invoice = RawInvoice::new(Network::Bitcoin, None, 1234567, vec![
			Tag::PaymentHash([0; 32]),
			Tag::PaymentSecret([1; 32]),
			Tag::Description("first".to_owned()),
			Tag::Description("second".to_owned()),
		]).unwrap();

		assert_eq!(invoice.description(), Some("first"));
		assert_eq!(invoice.tags().len(), 4);
	}

	#[test]
	fn test_default_values() {
		let invoice = InvoiceBuilder::new(Network::Bitcoin)
			.description("Test".into())
			.payment_hash([0; 32])
			.payment_secret([0; 32])
			.timestamp(1234567)
			.build_signed(&SecretKey::from_slice(&[41; 32]).unwrap())
			.unwrap();

		assert_eq!(invoice.min_final_cltv_expiry(), DEFAULT_MIN_FINAL_CLTV_EXPIRY);
		assert_eq!(invoice.expiry_time(), DEFAULT_EXPIRY_TIME);
		assert_eq!(invoice.expires_at(), 1234567 + DEFAULT_EXPIRY_TIME);
		assert!(!invoice.would_expire(1234568));
		assert!(invoice.would_expire(1234567 + DEFAULT_EXPIRY_TIME + 1));
	}

	#[test]
	fn test_expiry_saturates() {
		let invoice = InvoiceBuilder::new(Network::Bitcoin)
			.description("Test".into())
			.payment_hash([0; 32])
			.payment_secret([0; 32])
			.timestamp(1234567)
			.expiry_time(u64::max_value())
			.build_signed(&SecretKey::from_slice(&[41; 32]).unwrap())
			.unwrap();

		assert_eq!(invoice.expires_at(), u64::max_value());
		assert!(!invoice.would_expire(u64::max_value()));
	}

	#[test]
	fn test_builder_fail() {
		let builder = InvoiceBuilder::new(Network::Bitcoin)
			.description("Test".into())
			.payment_hash([0; 32])
			.payment_secret([0; 32]);

		assert_eq!(
			builder.clone().timestamp(MAX_TIMESTAMP + 1).build_raw(),
			Err(Error::InvalidInvoice("timestamp does not fit into 35 bits"))
		);

		assert_eq!(
			builder.clone().timestamp(1234567)
				.fallback_address(FallbackAddress { version: 32, hash: vec![0; 20] })
				.build_raw(),
			Err(Error::InvalidInvoice("fallback version does not fit five bits"))
		);

		let invoice = builder.timestamp(1234567).amount_satoshis(u64::max_value()).build_raw();
		assert_eq!(invoice, Err(Error::InvalidAmount));
	}

	#[test]
	fn test_builder_ok() {
		let secret_key = test_secret_key();
		let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);

		let invoice = InvoiceBuilder::new(Network::Testnet)
			.amount_milli_satoshis(123)
			.timestamp(1234567)
			.payee(public_key.clone())
			.expiry_time(54321)
			.min_final_cltv_expiry(144)
			.fallback_address(FallbackAddress { version: 17, hash: vec![0; 20] })
			.description_hash([3; 32])
			.payment_hash([21; 32])
			.payment_secret([42; 32])
			.basic_mpp()
			.build_signed(&secret_key)
			.unwrap();

		assert_eq!(invoice.network(), Network::Testnet);
		assert_eq!(invoice.amount_milli_satoshis(), Some(123));
		assert_eq!(invoice.amount_satoshis(), None);
		assert_eq!(invoice.timestamp(), 1234567);
		assert_eq!(invoice.payee(), Some(&public_key));
		assert_eq!(invoice.payee_node_key(), &public_key);
		assert_eq!(invoice.expiry_time(), 54321);
		assert_eq!(invoice.min_final_cltv_expiry(), 144);
		assert_eq!(
			invoice.fallback_addresses(),
			vec![&FallbackAddress { version: 17, hash: vec![0; 20] }]
		);
		assert_eq!(invoice.description_hash(), Some(&[3; 32]));
		assert_eq!(invoice.payment_hash(), Some(&[21; 32]));
		assert_eq!(invoice.payment_secret(), Some(&[42; 32]));

		let features = invoice.features().unwrap();
		assert!(features.requires(Feature::VariableLengthOnion));
		assert!(features.requires(Feature::PaymentSecret));
		assert!(features.supports(Feature::BasicMpp));
		assert!(!features.requires(Feature::BasicMpp));

		// The invoice round-trips through its string form.
		let reparsed = Invoice::from_str(&invoice.to_string()).unwrap();
		assert_eq!(reparsed, invoice);
	}

	#[cfg(feature = "serde")]
	#[test]
	fn test_serde() {
		let invoice = donation_invoice().sign(&test_secret_key()).unwrap();
		let serialized = serde_json::to_string(&invoice).unwrap();
		let deserialized: Invoice = serde_json::from_str(&serialized).unwrap();
		assert_eq!(invoice, deserialized);
		assert_eq!(invoice.payment_request(), serialized.trim_matches('"'));
	}
}
