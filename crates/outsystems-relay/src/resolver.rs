/// Remaps a lookup document into the flat OutSystems result.
///
/// Value search runs three strategies in order and stops at the first hit:
/// 1. exact category + exact parameter name
/// 2. exact category + parameter name compared trimmed and case-folded
/// 3. any category, parameter names compared with spaces and slashes removed,
///    equal or either one containing the other
///
/// Strategy 3 can pick the wrong parameter; it only runs when 1 and 2 found nothing.
use std::fmt;

use serde_json::Value;
use tracing::debug;

use lookup_common::document::{LookupDocument, Parameter};

use crate::mapping::FieldMappingTable;
use crate::model::{FieldSource, FieldValue, ResultDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    CaseInsensitive,
    Fuzzy,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::CaseInsensitive => "case_insensitive",
            MatchStrategy::Fuzzy => "fuzzy",
        })
    }
}

/// A parameter hit: which strategy found it, and its first value if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMatch<'a> {
    pub strategy: MatchStrategy,
    pub category: &'a str,
    pub parameter: &'a str,
    pub value: Option<&'a Value>,
}

impl<'a> ValueMatch<'a> {
    fn new(strategy: MatchStrategy, category: &'a str, parameter: &'a Parameter) -> Self {
        Self {
            strategy,
            category,
            parameter: &parameter.name,
            value: parameter.first_value(),
        }
    }
}

/// Search `document` for `source`, returning the first hit across the three strategies.
pub fn find_value<'a>(document: &'a LookupDocument, source: &FieldSource) -> Option<ValueMatch<'a>> {
    find_exact(document, source)
        .or_else(|| find_case_insensitive(document, source))
        .or_else(|| find_fuzzy(document, source))
}

fn find_exact<'a>(document: &'a LookupDocument, source: &FieldSource) -> Option<ValueMatch<'a>> {
    document
        .main_categories
        .iter()
        .filter(|c| c.name == source.category)
        .find_map(|category| {
            category
                .parameters
                .iter()
                .find(|p| p.name == source.parameter)
                .map(|p| ValueMatch::new(MatchStrategy::Exact, &category.name, p))
        })
}

fn find_case_insensitive<'a>(
    document: &'a LookupDocument,
    source: &FieldSource,
) -> Option<ValueMatch<'a>> {
    let wanted = source.parameter.trim().to_lowercase();
    document
        .main_categories
        .iter()
        .filter(|c| c.name == source.category)
        .find_map(|category| {
            category
                .parameters
                .iter()
                .find(|p| p.name.trim().to_lowercase() == wanted)
                .map(|p| ValueMatch::new(MatchStrategy::CaseInsensitive, &category.name, p))
        })
}

fn find_fuzzy<'a>(document: &'a LookupDocument, source: &FieldSource) -> Option<ValueMatch<'a>> {
    let wanted = squash(&source.parameter, true);
    if wanted.is_empty() {
        return None;
    }
    document
        .parameters()
        .find(|(_, p)| {
            let candidate = squash(&p.name, false);
            // an empty name is a substring of everything
            !candidate.is_empty()
                && (candidate == wanted || candidate.contains(&wanted) || wanted.contains(&candidate))
        })
        .map(|(category, p)| ValueMatch::new(MatchStrategy::Fuzzy, &category.name, p))
}

/// Drop spaces and slashes (and tabs for the target name), then case-fold.
fn squash(name: &str, strip_tabs: bool) -> String {
    name.chars()
        .filter(|&c| c != ' ' && c != '/' && !(strip_tabs && c == '\t'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolves every output field against a lookup document.
#[derive(Debug, Clone)]
pub struct FieldResolver {
    table: FieldMappingTable,
    fields: Vec<String>,
}

impl FieldResolver {
    pub fn new<I, S>(table: FieldMappingTable, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn table(&self) -> &FieldMappingTable {
        &self.table
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Build the flat result. Never fails: unmapped fields and missing data
    /// become sentinel values.
    pub fn resolve(&self, document: &LookupDocument) -> ResultDocument {
        self.fields
            .iter()
            .map(|field| (field.clone(), self.resolve_field(document, field)))
            .collect()
    }

    pub fn resolve_field(&self, document: &LookupDocument, field: &str) -> FieldValue {
        let Some((key, source)) = self.table.resolve_key(field) else {
            debug!(field, "no mapping for output field");
            return FieldValue::Unmapped;
        };

        match find_value(document, source) {
            Some(hit) => {
                debug!(
                    field,
                    key,
                    strategy = %hit.strategy,
                    category = hit.category,
                    parameter = hit.parameter,
                    "output field matched"
                );
                FieldValue::from_lookup(hit.value)
            }
            None => {
                debug!(
                    field,
                    key,
                    category = %source.category,
                    parameter = %source.parameter,
                    "no data for mapped field"
                );
                FieldValue::Missing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mapping::OUTPUT_FIELDS;
    use crate::model::{MISSING_SENTINEL, UNMAPPED_SENTINEL};
    use lookup_common::document::Category;

    fn param(name: &str, values: Vec<Value>) -> Parameter {
        Parameter {
            name: name.to_string(),
            values,
        }
    }

    fn category(name: &str, parameters: Vec<Parameter>) -> Category {
        Category {
            name: name.to_string(),
            parameters,
        }
    }

    fn doc(categories: Vec<Category>) -> LookupDocument {
        LookupDocument {
            main_categories: categories,
        }
    }

    fn sample_document() -> LookupDocument {
        doc(vec![
            category(
                "Product",
                vec![
                    param("Basic Type", vec![json!("P5151E")]),
                    param("Product Line", vec![json!("PL42"), json!("PL43")]),
                    param("Division", vec![]),
                    param("Chip Delivery", vec![json!("")]),
                ],
            ),
            category(
                "Preassembly general",
                vec![
                    param(" Wafer Diameter ", vec![json!("300 mm")]),
                    param("Raster x/mm", vec![json!(4.2)]),
                ],
            ),
            category(
                "Front Side Stack",
                vec![param("frontsidemetalstackwoepa", vec![json!("AlCu 3.2")])],
            ),
        ])
    }

    #[test]
    fn test_exact_match_returns_first_value() {
        let document = sample_document();
        let hit = find_value(&document, &FieldSource::new("Product", "Basic Type")).unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Exact);
        assert_eq!(hit.value, Some(&json!("P5151E")));

        let hit = find_value(&document, &FieldSource::new("Product", "Product Line")).unwrap();
        assert_eq!(hit.value, Some(&json!("PL42")));
    }

    #[test]
    fn test_basic_type_resolves_through_table() {
        let resolver = FieldResolver::new(FieldMappingTable::builtin(), ["Basic_type"]);
        let result = resolver.resolve(&sample_document());
        assert_eq!(result["Basic_type"], FieldValue::Found(json!("P5151E")));
    }

    #[test]
    fn test_case_insensitive_fallback_within_category() {
        let document = sample_document();
        let hit =
            find_value(&document, &FieldSource::new("Preassembly general", "Wafer diameter")).unwrap();
        assert_eq!(hit.strategy, MatchStrategy::CaseInsensitive);
        assert_eq!(hit.parameter, " Wafer Diameter ");
        assert_eq!(hit.value, Some(&json!("300 mm")));
    }

    #[test]
    fn test_fuzzy_match_ignores_spaces_slashes_and_case() {
        let document = sample_document();
        let hit = find_value(
            &document,
            &FieldSource::new("Front Side Stack", "FrontSideMetal Stack w/o EPA"),
        )
        .unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Fuzzy);
        assert_eq!(hit.value, Some(&json!("AlCu 3.2")));
    }

    #[test]
    fn test_fuzzy_match_searches_every_category() {
        let document = sample_document();
        let hit = find_value(&document, &FieldSource::new("Nowhere", "Raster\tX")).unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Fuzzy);
        assert_eq!(hit.category, "Preassembly general");
        assert_eq!(hit.value, Some(&json!(4.2)));
    }

    #[test]
    fn test_fuzzy_match_accepts_substrings_both_ways() {
        let document = doc(vec![category(
            "Thinning",
            vec![param("TAIKO Ring height/µm (nominal)", vec![json!("120")])],
        )]);
        let hit = find_value(&document, &FieldSource::new("Other", "TAIKO Ring height/µm")).unwrap();
        assert_eq!(hit.value, Some(&json!("120")));

        let document = doc(vec![category("Thinning", vec![param("Ring", vec![json!("x")])])]);
        let hit = find_value(&document, &FieldSource::new("Other", "TAIKO Ring height")).unwrap();
        assert_eq!(hit.value, Some(&json!("x")));
    }

    #[test]
    fn test_exact_beats_earlier_fuzzy_candidate() {
        // The fuzzy candidate comes first in document order, but the exact
        // match must still win.
        let document = doc(vec![
            category("Misc", vec![param("Ratio", vec![json!("wrong")])]),
            category("Preassembly general", vec![param("Ratio", vec![json!("1.25")])]),
        ]);
        let hit = find_value(&document, &FieldSource::new("Preassembly general", "Ratio")).unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Exact);
        assert_eq!(hit.value, Some(&json!("1.25")));
    }

    #[test]
    fn test_exact_scans_repeated_category_names() {
        let document = doc(vec![
            category("Product", vec![param("Other", vec![json!("a")])]),
            category("Product", vec![param("Division", vec![json!("ATV")])]),
        ]);
        let hit = find_value(&document, &FieldSource::new("Product", "Division")).unwrap();
        assert_eq!(hit.strategy, MatchStrategy::Exact);
        assert_eq!(hit.value, Some(&json!("ATV")));
    }

    #[test]
    fn test_match_outlives_field_source() {
        let document = sample_document();
        let hit = {
            let source = FieldSource::new("Product", "Product Line");
            find_value(&document, &source).unwrap()
        };
        assert_eq!(hit.category, "Product");
        assert_eq!(hit.value, Some(&json!("PL42")));

        let hit = {
            let source = FieldSource::new("Preassembly general", "wafer diameter");
            find_value(&document, &source).unwrap()
        };
        assert_eq!(hit.strategy, MatchStrategy::CaseInsensitive);
    }

    #[test]
    fn test_empty_parameter_names_never_fuzzy_match() {
        let document = doc(vec![category("Other", vec![param("", vec![json!("junk")])])]);
        assert!(find_value(&document, &FieldSource::new("Product", "Division")).is_none());
    }

    #[test]
    fn test_no_match_is_none() {
        let document = sample_document();
        assert!(find_value(&document, &FieldSource::new("BackEnd", "Segment")).is_none());
    }

    #[test]
    fn test_resolve_full_output_list() {
        let resolver = FieldResolver::new(FieldMappingTable::builtin(), OUTPUT_FIELDS);
        let result = resolver.resolve(&sample_document());

        let keys: Vec<&str> = result.keys().map(String::as_str).collect();
        assert_eq!(keys, OUTPUT_FIELDS);

        assert_eq!(result["PROCESS_GROUP"], FieldValue::Found(json!("PL42")));
        assert_eq!(result["WAFER_DIAMETER"], FieldValue::Found(json!("300 mm")));
        assert_eq!(result["RASTER_X"], FieldValue::Found(json!(4.2)));
        assert_eq!(result["BEOL_STACK_THICKNESS"], FieldValue::Found(json!("AlCu 3.2")));
        // mapped, empty value list
        assert_eq!(result["DIVISION"], FieldValue::Missing);
        // mapped, empty string
        assert_eq!(result["CHIP_DELIVERY"], FieldValue::Missing);
        // mapped, absent from the document
        assert_eq!(result["DAF"], FieldValue::Missing);
        assert_eq!(result["BASICTYPE_NAME"], FieldValue::Unmapped);
        assert_eq!(result["LAYOUT/DIE"], FieldValue::Unmapped);
    }

    #[test]
    fn test_every_unmapped_field_gets_the_sentinel() {
        let resolver = FieldResolver::new(FieldMappingTable::builtin(), OUTPUT_FIELDS);
        let result = resolver.resolve(&LookupDocument::default());
        for (field, value) in &result {
            let expected = if resolver.table().resolve_key(field).is_some() {
                MISSING_SENTINEL
            } else {
                UNMAPPED_SENTINEL
            };
            assert_eq!(serde_json::to_value(value).unwrap(), json!(expected), "field {field}");
        }
    }
}
