//! Recipient sets keyed by recipient kind (to, cc, bcc).

use super::message::Address;

/// One of the three recipient header kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    /// Parse a recipient kind, ignoring case.
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "to" => Some(RecipientKind::To),
            "cc" => Some(RecipientKind::Cc),
            "bcc" => Some(RecipientKind::Bcc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::To => "to",
            RecipientKind::Cc => "cc",
            RecipientKind::Bcc => "bcc",
        }
    }
}

/// One address or an ordered list of addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressList(Vec<Address>);

impl AddressList {
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.0.iter()
    }

    /// True when no address in the list is non-blank.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(Address::is_blank)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Address> for AddressList {
    fn from(address: Address) -> Self {
        AddressList(vec![address])
    }
}

impl From<&str> for AddressList {
    fn from(address: &str) -> Self {
        AddressList(vec![Address::from(address)])
    }
}

impl From<String> for AddressList {
    fn from(address: String) -> Self {
        AddressList(vec![Address::from(address)])
    }
}

impl<A: Into<Address>> From<Vec<A>> for AddressList {
    fn from(addresses: Vec<A>) -> Self {
        AddressList(addresses.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Address>, const N: usize> From<[A; N]> for AddressList {
    fn from(addresses: [A; N]) -> Self {
        AddressList(addresses.into_iter().map(Into::into).collect())
    }
}

/// Recipients keyed by kind.
///
/// Keys are kept as given so that an unknown kind can be reported by the
/// composer; they are matched case-insensitively against `to`, `cc` and
/// `bcc` when the message is assembled, and entries of the same kind are
/// appended in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    entries: Vec<(String, AddressList)>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding only `to` recipients.
    pub fn to(addresses: impl Into<AddressList>) -> Self {
        Self::new().with("to", addresses)
    }

    /// Insert recipients under `kind`, replacing a previous entry with the
    /// identical key.
    pub fn insert(&mut self, kind: impl Into<String>, addresses: impl Into<AddressList>) {
        let kind = kind.into();
        let addresses = addresses.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == kind) {
            Some((_, existing)) => *existing = addresses,
            None => self.entries.push((kind, addresses)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, kind: impl Into<String>, addresses: impl Into<AddressList>) -> Self {
        self.insert(kind, addresses);
        self
    }

    /// True when no entry carries a non-blank address.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, addresses)| addresses.is_blank())
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &AddressList)> {
        self.entries
            .iter()
            .map(|(kind, addresses)| (kind.as_str(), addresses))
    }
}

impl<K: Into<String>, V: Into<AddressList>> FromIterator<(K, V)> for RecipientSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = RecipientSet::new();
        for (kind, addresses) in iter {
            set.insert(kind, addresses);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_kind_parse_is_case_insensitive() {
        assert_eq!(RecipientKind::parse("to"), Some(RecipientKind::To));
        assert_eq!(RecipientKind::parse("CC"), Some(RecipientKind::Cc));
        assert_eq!(RecipientKind::parse("Bcc"), Some(RecipientKind::Bcc));
        assert_eq!(RecipientKind::parse("reply_to"), None);
        assert_eq!(RecipientKind::parse(""), None);
    }

    #[test]
    fn recipient_kind_round_trips_through_as_str() {
        for kind in [RecipientKind::To, RecipientKind::Cc, RecipientKind::Bcc] {
            assert_eq!(RecipientKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn address_list_from_single_and_many() {
        assert_eq!(AddressList::from("a@b.com").len(), 1);
        assert_eq!(AddressList::from(vec!["a@b.com", "c@d.com"]).len(), 2);
        assert_eq!(AddressList::from(["a@b.com", "c@d.com", "e@f.com"]).len(), 3);
        assert_eq!(
            AddressList::from(Address::with_name("a@b.com", "Ann"))
                .iter()
                .next()
                .and_then(|a| a.name.as_deref()),
            Some("Ann")
        );
    }

    #[test]
    fn empty_set_is_empty() {
        assert!(RecipientSet::new().is_empty());
    }

    #[test]
    fn set_with_only_blank_addresses_is_empty() {
        let set = RecipientSet::to("  ").with("cc", Vec::<String>::new());
        assert!(set.is_empty());
    }

    #[test]
    fn set_with_unknown_kind_is_not_empty() {
        let set = RecipientSet::new().with("foo", "a@b.com");
        assert!(!set.is_empty());
    }

    #[test]
    fn insert_same_key_replaces_entry() {
        let mut set = RecipientSet::to("first@b.com");
        set.insert("to", "second@b.com");

        let entries: Vec<_> = set.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].1.iter().next().map(|a| a.email.as_str()),
            Some("second@b.com")
        );
    }

    #[test]
    fn from_iterator_preserves_order() {
        let set: RecipientSet = [("to", "a@b.com"), ("CC", "c@d.com"), ("bcc", "e@f.com")]
            .into_iter()
            .collect();

        let kinds: Vec<_> = set.entries().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec!["to", "CC", "bcc"]);
    }
}
