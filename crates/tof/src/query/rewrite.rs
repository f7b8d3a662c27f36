//! Query rewriting for translated fields.
//!
//! References to a translated field are replaced by conditions on the
//! translation table, so callers can filter and order by the field as if it
//! were a plain column.

use crate::class::{ClassState, ID_FIELD};
use crate::config::{FilterLanguage, Settings};
use crate::models::TranslatableField;

use super::types::{
    Annotation, AnnotationExpr, Condition, Filter, FilterValue, LOOKUP_SEP, OrderTerm, Subquery,
    key_field,
};

/// Column of a translation row holding the translated text.
pub const VALUE_KEY: &str = "value";
/// Column of a translation row holding the language code.
pub const LANG_KEY: &str = "lang";

/// Rewrites queries against one class state under one language context.
#[derive(Debug)]
pub struct Rewriter<'a> {
    state: &'a ClassState,
    policy: &'a FilterLanguage,
    default_language: &'a str,
    current_language: String,
}

impl<'a> Rewriter<'a> {
    pub fn new(state: &'a ClassState, settings: &'a Settings, current_language: String) -> Self {
        Self {
            state,
            policy: &settings.default_filter_language,
            default_language: &settings.default_language,
            current_language,
        }
    }

    /// False when the class has no translated field and nothing needs
    /// rewriting.
    pub fn is_needed(&self) -> bool {
        self.state.translated_fields().next().is_some()
    }

    fn translated(&self, field: &str) -> Option<&TranslatableField> {
        self.state
            .descriptor(field)
            .and_then(|d| d.translatable_field())
    }

    /// Language restriction applied inside every subquery.
    pub fn language_scope(&self) -> Option<Filter> {
        match self.policy {
            FilterLanguage::All => None,
            FilterLanguage::Current => Some(Filter::leaf(LANG_KEY, self.current_language.as_str())),
            FilterLanguage::Fixed(code) => Some(Filter::leaf(LANG_KEY, code.as_str())),
            FilterLanguage::AnyOf(codes) => Some(Filter::leaf(
                format!("{LANG_KEY}{LOOKUP_SEP}in"),
                codes.clone(),
            )),
            FilterLanguage::PerLanguage(table) => {
                let codes = table
                    .get(&self.current_language)
                    .cloned()
                    .unwrap_or_else(|| vec![self.default_language.to_string()]);
                Some(Filter::leaf(format!("{LANG_KEY}{LOOKUP_SEP}in"), codes))
            }
        }
    }

    /// `id__in` condition selecting owners whose translation matches.
    fn subquery_condition(&self, field: &TranslatableField, condition: &Condition) -> Condition {
        let value_key = match condition.key.split_once(LOOKUP_SEP) {
            Some((_, lookup)) => format!("{VALUE_KEY}{LOOKUP_SEP}{lookup}"),
            None => VALUE_KEY.to_string(),
        };
        let mut filter = Filter::And(vec![Filter::leaf(value_key, condition.value.clone())]);
        if let Some(scope) = self.language_scope() {
            filter = filter.and(scope);
        }
        Condition::new(
            format!("{ID_FIELD}{LOOKUP_SEP}in"),
            Subquery {
                field_id: field.id.clone(),
                filter,
            },
        )
    }

    /// Rewrite one keyword condition. Returns the condition unchanged when
    /// its field is not translated.
    pub fn rewrite_condition(&self, condition: Condition) -> (Condition, bool) {
        match self.translated(key_field(&condition.key)) {
            Some(field) => (self.subquery_condition(field, &condition), true),
            None => (condition, false),
        }
    }

    /// Rewrite keyword pairs, each independently, into an AND.
    pub fn rewrite_pairs(&self, conditions: Vec<Condition>) -> Filter {
        Filter::And(
            conditions
                .into_iter()
                .map(|c| Filter::Leaf(self.rewrite_condition(c).0))
                .collect(),
        )
    }

    /// Rewrite a filter tree keeping its shape.
    ///
    /// A rewritten leaf becomes `subquery OR original`, so records whose
    /// base column holds the origin value still match.
    pub fn rewrite_tree(&self, filter: Filter) -> Filter {
        match filter {
            Filter::Leaf(condition) => match self.translated(condition.field()) {
                Some(field) => Filter::Or(vec![
                    Filter::Leaf(self.subquery_condition(field, &condition)),
                    Filter::Leaf(condition),
                ]),
                None => Filter::Leaf(condition),
            },
            Filter::And(children) => {
                Filter::And(children.into_iter().map(|c| self.rewrite_tree(c)).collect())
            }
            Filter::Or(children) => {
                Filter::Or(children.into_iter().map(|c| self.rewrite_tree(c)).collect())
            }
            Filter::Not(inner) => Filter::Not(Box::new(self.rewrite_tree(*inner))),
        }
    }

    /// Rewrite ordering terms. Translated fields order by an annotation
    /// `_<field>` holding the current-language translation.
    pub fn rewrite_ordering(&self, terms: Vec<OrderTerm>) -> (Vec<OrderTerm>, Vec<Annotation>) {
        let mut annotations: Vec<Annotation> = Vec::new();
        let ordering = terms
            .into_iter()
            .map(|term| match self.translated(&term.field) {
                Some(field) => {
                    let name = annotation_name(&term.field);
                    if !annotations.iter().any(|a| a.name == name) {
                        annotations.push(Annotation {
                            name: name.clone(),
                            expr: AnnotationExpr::TranslatedValue {
                                field_id: field.id.clone(),
                                lang: self.current_language.clone(),
                            },
                        });
                    }
                    OrderTerm {
                        field: name,
                        descending: term.descending,
                    }
                }
                None => term,
            })
            .collect();
        (ordering, annotations)
    }
}

/// Annotation name used to order by a translated field.
pub fn annotation_name(field: &str) -> String {
    format!("_{field}")
}

/// True if `value` is an `id__in` translation subquery.
pub fn is_translation_subquery(condition: &Condition) -> bool {
    matches!(condition.value, FilterValue::Subquery(_))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::class::{FieldKind, ModelClass, ModelDefinition, activate};
    use crate::models::ContentType;

    fn state() -> ClassState {
        let class = ModelClass::new(
            ModelDefinition::new(ContentType::new("shop", "product"))
                .field("title", FieldKind::Text)
                .field("price", FieldKind::Integer),
        );
        let title = TranslatableField::new(class.content_type().clone(), "title", "").unwrap();
        activate(&class, &title, true).unwrap();
        class.snapshot()
    }

    fn settings(policy: FilterLanguage) -> Settings {
        Settings {
            default_filter_language: policy,
            ..Settings::default()
        }
    }

    fn subquery(condition: &Condition) -> &Subquery {
        condition.value.as_subquery().expect("subquery")
    }

    #[test]
    fn translated_key_becomes_id_in_subquery() {
        let state = state();
        let settings = settings(FilterLanguage::Current);
        let rewriter = Rewriter::new(&state, &settings, "fr".to_string());

        let (cond, rewritten) =
            rewriter.rewrite_condition(Condition::new("title__icontains", "bonj"));
        assert!(rewritten);
        assert_eq!(cond.key, "id__in");
        let sub = subquery(&cond);
        assert_eq!(sub.field_id, "shop.product.title");
        assert_eq!(
            sub.filter,
            Filter::And(vec![
                Filter::leaf("value__icontains", "bonj"),
                Filter::leaf("lang", "fr"),
            ])
        );
    }

    #[test]
    fn plain_key_untouched() {
        let state = state();
        let settings = Settings::default();
        let rewriter = Rewriter::new(&state, &settings, "en".to_string());
        let (cond, rewritten) = rewriter.rewrite_condition(Condition::new("price__gt", 10));
        assert!(!rewritten);
        assert_eq!(cond, Condition::new("price__gt", 10));
    }

    #[test]
    fn language_scopes() {
        let state = state();
        let cases = [
            (FilterLanguage::All, None),
            (
                FilterLanguage::Fixed("de".to_string()),
                Some(Filter::leaf("lang", "de")),
            ),
            (
                FilterLanguage::AnyOf(vec!["de".to_string(), "fr".to_string()]),
                Some(Filter::leaf("lang__in", vec!["de", "fr"])),
            ),
            (
                FilterLanguage::PerLanguage(BTreeMap::from([(
                    "fr".to_string(),
                    vec!["fr".to_string(), "en".to_string()],
                )])),
                Some(Filter::leaf("lang__in", vec!["fr", "en"])),
            ),
        ];
        for (policy, expected) in cases {
            let settings = settings(policy);
            let rewriter = Rewriter::new(&state, &settings, "fr".to_string());
            assert_eq!(rewriter.language_scope(), expected);
        }
    }

    #[test]
    fn per_language_falls_back_to_default_language() {
        let state = state();
        let settings = settings(FilterLanguage::PerLanguage(BTreeMap::new()));
        let rewriter = Rewriter::new(&state, &settings, "it".to_string());
        assert_eq!(
            rewriter.language_scope(),
            Some(Filter::leaf("lang__in", vec!["en"]))
        );
    }

    #[test]
    fn pairs_rewritten_independently() {
        let state = state();
        let settings = settings(FilterLanguage::All);
        let rewriter = Rewriter::new(&state, &settings, "en".to_string());

        let filter = rewriter.rewrite_pairs(vec![
            Condition::new("title", "a"),
            Condition::new("title__startswith", "b"),
            Condition::new("price", 3),
        ]);
        let conditions = filter.conditions();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[0].key, "id__in");
        assert_eq!(conditions[1].key, "id__in");
        assert_eq!(conditions[2].key, "price");
    }

    #[test]
    fn tree_rewrite_keeps_structure() {
        let state = state();
        let settings = settings(FilterLanguage::All);
        let rewriter = Rewriter::new(&state, &settings, "en".to_string());

        let tree = Filter::leaf("title", "x")
            .or(Filter::leaf("price__lt", 5))
            .not();
        let Filter::Not(inner) = rewriter.rewrite_tree(tree) else {
            panic!("expected Not");
        };
        let Filter::Or(children) = *inner else {
            panic!("expected Or");
        };
        assert_eq!(children.len(), 2);
        match &children[0] {
            Filter::Or(parts) => {
                assert!(matches!(&parts[0], Filter::Leaf(c) if is_translation_subquery(c)));
                assert_eq!(parts[1], Filter::leaf("title", "x"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(children[1], Filter::leaf("price__lt", 5));
    }

    #[test]
    fn ordering_by_translated_field_uses_annotation() {
        let state = state();
        let settings = Settings::default();
        let rewriter = Rewriter::new(&state, &settings, "de".to_string());

        let (ordering, annotations) =
            rewriter.rewrite_ordering(vec![OrderTerm::from("-title"), OrderTerm::from("price")]);
        assert_eq!(ordering, vec![OrderTerm::desc("_title"), OrderTerm::asc("price")]);
        assert_eq!(
            annotations,
            vec![Annotation {
                name: "_title".to_string(),
                expr: AnnotationExpr::TranslatedValue {
                    field_id: "shop.product.title".to_string(),
                    lang: "de".to_string(),
                },
            }]
        );
    }

    #[test]
    fn plain_class_needs_no_rewrite() {
        let class = ModelClass::new(
            ModelDefinition::new(ContentType::new("shop", "tag")).field("name", FieldKind::Text),
        );
        let state = class.snapshot();
        let settings = Settings::default();
        let rewriter = Rewriter::new(&state, &settings, "en".to_string());
        assert!(!rewriter.is_needed());
    }
}
