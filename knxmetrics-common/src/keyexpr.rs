use crate::event::EventKind;
use crate::group_address::GroupAddress;

/// Default key expression prefix for KNX gateway traffic.
pub const KEY_PREFIX: &str = "knx";

/// Builder for gateway key expressions.
///
/// Key expressions follow the pattern:
/// `<prefix>/<main>/<middle>/<sub>/<event>`
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl Default for KeyExprBuilder {
    fn default() -> Self {
        Self::new(KEY_PREFIX)
    }
}

impl KeyExprBuilder {
    /// Create a builder with a custom prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Build the key for one event kind on one group address.
    ///
    /// # Example
    /// ```
    /// use knxmetrics_common::keyexpr::KeyExprBuilder;
    /// use knxmetrics_common::{EventKind, GroupAddress};
    ///
    /// let builder = KeyExprBuilder::default();
    /// let addr: GroupAddress = "1/2/3".parse().unwrap();
    /// assert_eq!(builder.event_key(&addr, EventKind::Write), "knx/1/2/3/write");
    /// ```
    pub fn event_key(&self, address: &GroupAddress, kind: EventKind) -> String {
        format!("{}/{}/{}", self.prefix, address, kind.as_str())
    }

    /// Key a read request for `address` is published on.
    pub fn read_key(&self, address: &GroupAddress) -> String {
        self.event_key(address, EventKind::Read)
    }

    /// Wildcard for every event on one group address.
    ///
    /// # Example
    /// ```
    /// use knxmetrics_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::default();
    /// let addr = "2/1/0".parse().unwrap();
    /// assert_eq!(builder.address_wildcard(&addr), "knx/2/1/0/*");
    /// ```
    pub fn address_wildcard(&self, address: &GroupAddress) -> String {
        format!("{}/{}/*", self.prefix, address)
    }

    /// Wildcard for all gateway traffic under this prefix.
    pub fn all_events_wildcard(&self) -> String {
        format!("{}/**", self.prefix)
    }

    /// Parse a key expression published under this builder's prefix.
    ///
    /// Returns `None` if the key has a different prefix or shape.
    ///
    /// # Example
    /// ```
    /// use knxmetrics_common::keyexpr::KeyExprBuilder;
    /// use knxmetrics_common::EventKind;
    ///
    /// let builder = KeyExprBuilder::default();
    /// let parsed = builder.parse("knx/2/1/0/response").unwrap();
    /// assert_eq!(parsed.group_address.to_string(), "2/1/0");
    /// assert_eq!(parsed.event, EventKind::Response);
    /// ```
    pub fn parse(&self, key: &str) -> Option<ParsedKeyExpr> {
        let (address, event) = self.split(key)?;
        Some(ParsedKeyExpr {
            group_address: address.parse().ok()?,
            event,
        })
    }

    /// Split a key into its raw address part and event kind.
    ///
    /// Unlike [`parse`](Self::parse) the address is not validated, so keys
    /// for addresses outside the 3-level ranges still split.
    ///
    /// # Example
    /// ```
    /// use knxmetrics_common::keyexpr::KeyExprBuilder;
    /// use knxmetrics_common::EventKind;
    ///
    /// let builder = KeyExprBuilder::default();
    /// assert_eq!(
    ///     builder.split("knx/9/9/9/write"),
    ///     Some(("9/9/9", EventKind::Write))
    /// );
    /// ```
    pub fn split<'a>(&self, key: &'a str) -> Option<(&'a str, EventKind)> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        let (address, event) = rest.rsplit_once('/')?;
        if address.is_empty() {
            return None;
        }
        Some((address, event.parse().ok()?))
    }
}

/// Parsed components of a gateway key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKeyExpr {
    pub group_address: GroupAddress,
    pub event: EventKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_prefix_trailing_slash() {
        let builder = KeyExprBuilder::new("home/knx/");
        let addr = "1/2/3".parse().unwrap();
        assert_eq!(builder.read_key(&addr), "home/knx/1/2/3/read");
        assert_eq!(builder.all_events_wildcard(), "home/knx/**");
    }

    #[test]
    fn test_parse_roundtrip_with_nested_prefix() {
        let builder = KeyExprBuilder::new("site/a/knx");
        let addr: GroupAddress = "31/7/255".parse().unwrap();
        let key = builder.event_key(&addr, EventKind::Response);

        let parsed = builder.parse(&key).unwrap();
        assert_eq!(parsed.group_address, addr);
        assert_eq!(parsed.event, EventKind::Response);
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        let builder = KeyExprBuilder::default();
        assert!(builder.parse("other/1/2/3/write").is_none());
        assert!(builder.parse("knxx/1/2/3/write").is_none());
        assert!(builder.parse("knx/1/2/write").is_none());
        assert!(builder.parse("knx/1/2/999/write").is_none());
        assert!(builder.parse("knx").is_none());
    }

    #[test]
    fn test_split_keeps_unvalidated_address() {
        let builder = KeyExprBuilder::default();
        assert_eq!(
            builder.split("knx/1/2/999/response"),
            Some(("1/2/999", EventKind::Response))
        );
        assert_eq!(builder.split("knx/garage/write"), Some(("garage", EventKind::Write)));
        assert!(builder.split("knx//write").is_none());
        assert!(builder.split("knx/write").is_none());
        assert!(builder.split("other/1/2/3/write").is_none());
    }

    #[test]
    fn test_parse_unknown_event_kind() {
        let builder = KeyExprBuilder::default();
        let parsed = builder.parse("knx/1/2/3/indication").unwrap();
        assert_eq!(parsed.event, EventKind::Other);
    }
}
