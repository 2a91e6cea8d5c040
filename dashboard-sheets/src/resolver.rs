//! Schema-on-read lookup of canonical fields in arbitrarily titled rows.

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::trace;

use crate::fields::CanonicalField;
use crate::table::Row;

/// Lowercases and drops everything outside `[a-z0-9]`.
pub fn normalize_key(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Normalized aliases per field, in table order.
static NORMALIZED_ALIASES: LazyLock<HashMap<CanonicalField, Vec<String>>> = LazyLock::new(|| {
    CanonicalField::ALL
        .into_iter()
        .map(|field| {
            let aliases = field.aliases().iter().map(|alias| normalize_key(alias)).collect();
            (field, aliases)
        })
        .collect()
});

fn normalized_aliases(field: CanonicalField) -> &'static [String] {
    NORMALIZED_ALIASES
        .get(&field)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Resolves canonical fields against rows, remembering which raw header each
/// normalized alias matched.
///
/// The cache only speeds up lookups: a cached header is used when the row at
/// hand contains it, otherwise the row is scanned afresh. Call [`clear`] before
/// loading a new set of tables.
///
/// [`clear`]: FieldResolver::clear
#[derive(Debug, Default, Clone)]
pub struct FieldResolver {
    cache: HashMap<String, String>,
}

impl FieldResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every header binding.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of aliases currently bound to a header.
    pub fn cached_bindings(&self) -> usize {
        self.cache.len()
    }

    /// Header bound to a normalized alias, if any.
    pub fn cached_header(&self, normalized_alias: &str) -> Option<&str> {
        self.cache.get(normalized_alias).map(String::as_str)
    }

    /// Raw cell for `field`, or `None` when no header in the row matches.
    pub fn resolve<'r>(&mut self, row: &'r Row, field: CanonicalField) -> Option<&'r str> {
        if row.is_empty() {
            return None;
        }

        let aliases = normalized_aliases(field);

        for alias in aliases {
            if let Some(header) = self.cache.get(alias) {
                if let Some(Some(value)) = row.get(header) {
                    return Some(value.as_str());
                }
            }
        }

        let headers: Vec<(&String, String)> = row
            .keys()
            .map(|header| (header, normalize_key(header)))
            .collect();

        // Alias order decides between several exact matches.
        for alias in aliases {
            if let Some((header, _)) = headers.iter().find(|(_, normalized)| normalized == alias) {
                return self.bind(row, field, alias, header);
            }
        }

        for (header, normalized) in &headers {
            if normalized.is_empty() {
                continue;
            }
            if let Some(alias) = aliases
                .iter()
                .find(|alias| normalized.contains(alias.as_str()) || alias.contains(normalized.as_str()))
            {
                return self.bind(row, field, alias, header);
            }
        }

        None
    }

    /// Resolved cell trimmed, with blanks treated as missing.
    pub fn resolve_trimmed<'r>(&mut self, row: &'r Row, field: CanonicalField) -> Option<&'r str> {
        self.resolve(row, field)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn bind<'r>(
        &mut self,
        row: &'r Row,
        field: CanonicalField,
        alias: &str,
        header: &str,
    ) -> Option<&'r str> {
        trace!(%field, alias, header, "bound header");
        self.cache.insert(alias.to_string(), header.to_string());
        row.get(header).and_then(|value| value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::row;

    #[test]
    fn normalization_ignores_case_spacing_and_punctuation() {
        assert_eq!(normalize_key("Patient ID"), "patientid");
        assert_eq!(normalize_key(" Latest Follow-Up: "), "latestfollowup");
        assert_eq!(normalize_key("Insurance #1"), "insurance1");
    }

    #[test]
    fn exact_match_wins_over_substring_match() {
        let mut resolver = FieldResolver::new();
        let record = row([("Patient Status", "lost"), ("Status", "active")]);
        assert_eq!(resolver.resolve(&record, CanonicalField::Status), Some("active"));
        assert_eq!(resolver.cached_header("status"), Some("Status"));
    }

    #[test]
    fn exact_match_is_not_shadowed_by_earlier_fuzzy_candidate() {
        let mut resolver = FieldResolver::new();
        let record = row([("Insurance Status 1", "pending"), ("Status", "active")]);
        assert_eq!(resolver.resolve(&record, CanonicalField::Status), Some("active"));
    }

    #[test]
    fn substring_match_tolerates_decorated_headers() {
        let mut resolver = FieldResolver::new();
        let record = row([("Total Leads (Q2)", "40")]);
        assert_eq!(
            resolver.resolve(&record, CanonicalField::NumberTotalLeads),
            Some("40")
        );
    }

    #[test]
    fn cache_never_shadows_a_fresh_scan() {
        let mut resolver = FieldResolver::new();
        let first = row([("Zone", "North")]);
        let second = row([("Territory", "South")]);

        assert_eq!(resolver.resolve(&first, CanonicalField::Area), Some("North"));
        assert_eq!(resolver.resolve(&second, CanonicalField::Area), Some("South"));
        assert_eq!(resolver.resolve(&first, CanonicalField::Area), Some("North"));
    }

    #[test]
    fn cached_header_is_preferred_when_present() {
        let mut resolver = FieldResolver::new();
        let first = row([("Area", "West")]);
        assert_eq!(resolver.resolve(&first, CanonicalField::Area), Some("West"));

        let second = row([("Zone", "ignored"), ("Area", "East")]);
        assert_eq!(resolver.resolve(&second, CanonicalField::Area), Some("East"));
    }

    #[test]
    fn unmatched_field_resolves_to_none() {
        let mut resolver = FieldResolver::new();
        let record = row([("Name", "Ada")]);
        assert_eq!(resolver.resolve(&record, CanonicalField::EmrId), None);
        assert_eq!(resolver.cached_bindings(), 0);
    }

    #[test]
    fn clear_forgets_bindings() {
        let mut resolver = FieldResolver::new();
        let record = row([("Area", "West")]);
        resolver.resolve(&record, CanonicalField::Area);
        assert!(resolver.cached_bindings() > 0);
        resolver.clear();
        assert_eq!(resolver.cached_bindings(), 0);
    }

    #[test]
    fn alias_order_beats_column_order_on_exact_matches() {
        let mut resolver = FieldResolver::new();
        let record = row([("Provider", "Dr X"), ("PT", "Ana")]);
        assert_eq!(resolver.resolve(&record, CanonicalField::Therapist), Some("Ana"));
        assert_eq!(resolver.cached_header("pt"), Some("PT"));
    }

    #[test]
    fn abbreviated_header_matches_longer_alias() {
        let mut resolver = FieldResolver::new();
        let record = row([("Lead", "Referral")]);
        assert_eq!(
            resolver.resolve(&record, CanonicalField::LeadSource),
            Some("Referral")
        );
        assert_eq!(resolver.cached_header("sourceoflead"), Some("Lead"));
    }

    #[test]
    fn every_field_has_precomputed_aliases() {
        for field in CanonicalField::ALL {
            assert_eq!(normalized_aliases(field).len(), field.aliases().len());
        }
    }

    #[test]
    fn empty_normalized_header_never_fuzzy_matches() {
        let mut resolver = FieldResolver::new();
        let record = row([("#", "7")]);
        assert_eq!(resolver.resolve(&record, CanonicalField::Status), None);
    }
}
