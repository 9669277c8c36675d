//! Feature flags carried in the `9` tagged field, as defined by BOLT 9.
//!
//! The field is a big-endian bit string packed into 5-bit words. Bit 0 is
//! the least significant bit of the *last* word; even bits mark a feature as
//! required, the next odd bit marks it as optional. The word count observed
//! on the wire is retained so that re-encoding an invoice reproduces the
//! field byte for byte, including any zero-padding words.

/// Features with assigned bit pairs that this crate knows by name. Bits at
/// and above index 20 are carried opaquely, see
/// [`Features::extra_bit_indices`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Feature {
	/// `option_data_loss_protect` (bits 0/1)
	DataLossProtect,
	/// `initial_routing_sync` (bits 2/3)
	InitialRoutingSync,
	/// `option_upfront_shutdown_script` (bits 4/5)
	UpfrontShutdownScript,
	/// `gossip_queries` (bits 6/7)
	GossipQueries,
	/// `var_onion_optin` (bits 8/9)
	VariableLengthOnion,
	/// `gossip_queries_ex` (bits 10/11)
	GossipQueriesEx,
	/// `option_static_remotekey` (bits 12/13)
	StaticRemoteKey,
	/// `payment_secret` (bits 14/15)
	PaymentSecret,
	/// `basic_mpp` (bits 16/17)
	BasicMpp,
	/// `option_support_large_channel` (bits 18/19)
	Wumbo,
}

impl Feature {
	/// The even ("required") bit of this feature's pair.
	fn required_bit(self) -> usize {
		match self {
			Feature::DataLossProtect => 0,
			Feature::InitialRoutingSync => 2,
			Feature::UpfrontShutdownScript => 4,
			Feature::GossipQueries => 6,
			Feature::VariableLengthOnion => 8,
			Feature::GossipQueriesEx => 10,
			Feature::StaticRemoteKey => 12,
			Feature::PaymentSecret => 14,
			Feature::BasicMpp => 16,
			Feature::Wumbo => 18,
		}
	}
}

/// Bit index of the first feature without assigned semantics here.
const FIRST_EXTRA_BIT: usize = 20;

/// The feature bit field of an invoice.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Features {
	words: Vec<u8>,
}

impl Features {
	/// A feature field with no bits and zero width.
	pub fn empty() -> Features {
		Features { words: Vec::new() }
	}

	/// Wraps the raw words of a decoded `9` field. Words must already be in
	/// the 5-bit range, which bech32 decoding guarantees.
	pub(crate) fn from_words(words: Vec<u8>) -> Features {
		debug_assert!(words.iter().all(|w| *w < 32));
		Features { words }
	}

	/// The wire form: big-endian 5-bit words, most significant first.
	pub(crate) fn words(&self) -> &[u8] {
		&self.words
	}

	/// Number of 5-bit words this field occupies on the wire.
	pub fn word_length(&self) -> usize {
		self.words.len()
	}

	/// Reads bit `index` of the field. Bits beyond the field's width are
	/// unset.
	pub fn bit(&self, index: usize) -> bool {
		let width = self.words.len() * 5;
		if index >= width {
			return false;
		}
		self.words[(width - 1 - index) / 5] & (1 << (index % 5)) != 0
	}

	/// Sets bit `index`, growing the field by prepending zero words as
	/// needed.
	pub fn set_bit(&mut self, index: usize) {
		let needed_words = index / 5 + 1;
		if self.words.len() < needed_words {
			let missing = needed_words - self.words.len();
			self.words.splice(0..0, std::iter::repeat(0).take(missing));
		}
		let width = self.words.len() * 5;
		self.words[(width - 1 - index) / 5] |= 1 << (index % 5);
	}

	/// Whether the feature's required (even) bit is set.
	pub fn requires(&self, feature: Feature) -> bool {
		self.bit(feature.required_bit())
	}

	/// Whether the feature is advertised at all, required or optional.
	pub fn supports(&self, feature: Feature) -> bool {
		self.bit(feature.required_bit()) || self.bit(feature.required_bit() + 1)
	}

	/// Marks the feature as required.
	pub fn set_required(&mut self, feature: Feature) {
		self.set_bit(feature.required_bit());
	}

	/// Marks the feature as optional.
	pub fn set_optional(&mut self, feature: Feature) {
		self.set_bit(feature.required_bit() + 1);
	}

	/// Indices of all set bits without assigned semantics, ascending.
	pub fn extra_bit_indices(&self) -> Vec<usize> {
		(FIRST_EXTRA_BIT..self.words.len() * 5).filter(|i| self.bit(*i)).collect()
	}

	/// Whether any unassigned *even* bit is set, i.e. the sender demands a
	/// feature this crate cannot name.
	pub fn requires_unknown_bits(&self) -> bool {
		self.extra_bit_indices().iter().any(|i| i % 2 == 0)
	}
}
