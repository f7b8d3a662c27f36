//! Managers and query sets.
//!
//! A manager is a named entry point bound on a class. Query sets of a
//! translation-aware manager rewrite references to translated fields and
//! prefetch the translation rows of what they fetch. Query sets of a plain
//! manager do neither.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::backend::row_id;
use crate::class::{Capability, ManagerKind, ModelClass};
use crate::error::{Result, TofError};
use crate::instance::{Assign, Instance};
use crate::models::Translation;
use crate::query::{Condition, Filter, FilterValue, OrderTerm, QuerySpec, Rewriter};
use crate::state::Tof;

/// Upper bound on rows fetched by [`QuerySet::get`].
const MAX_GET_RESULTS: usize = 21;

/// Named manager of one model class.
#[derive(Clone)]
pub struct Manager {
    tof: Tof,
    class: Arc<ModelClass>,
    name: String,
    kind: ManagerKind,
}

impl Manager {
    pub(crate) fn new(tof: Tof, class: Arc<ModelClass>, name: String, kind: ManagerKind) -> Self {
        Self {
            tof,
            class,
            name,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ManagerKind {
        &self.kind
    }

    pub fn is_translation_aware(&self) -> bool {
        self.kind.is_translation_aware()
    }

    pub fn class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    /// Query set over every record.
    pub fn all(&self) -> QuerySet {
        QuerySet {
            tof: self.tof.clone(),
            class: Arc::clone(&self.class),
            translation_aware: self.is_translation_aware(),
            spec: QuerySpec::default(),
        }
    }

    pub fn filter<K, V, I>(&self, pairs: I) -> QuerySet
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.all().filter(pairs)
    }

    pub fn filter_q(&self, filter: Filter) -> QuerySet {
        self.all().filter_q(filter)
    }

    pub fn exclude<K, V, I>(&self, pairs: I) -> QuerySet
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.all().exclude(pairs)
    }

    pub fn exclude_q(&self, filter: Filter) -> QuerySet {
        self.all().exclude_q(filter)
    }

    pub fn order_by<T, I>(&self, terms: I) -> QuerySet
    where
        T: Into<OrderTerm>,
        I: IntoIterator<Item = T>,
    {
        self.all().order_by(terms)
    }

    pub async fn get<K, V, I>(&self, pairs: I) -> Result<Instance>
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.all().get(pairs).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.all().count().await
    }

    /// Unsaved instance with the given initial values.
    pub fn instance<K, V, I>(&self, values: I) -> Result<Instance>
    where
        K: AsRef<str>,
        V: Into<Assign>,
        I: IntoIterator<Item = (K, V)>,
    {
        Instance::new(Arc::clone(&self.class), self.tof.locale(), values)
    }

    /// Build and save a new instance.
    pub async fn create<K, V, I>(&self, values: I) -> Result<Instance>
    where
        K: AsRef<str>,
        V: Into<Assign>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut instance = self.instance(values)?;
        instance.save(self.tof.backend().as_ref()).await?;
        Ok(instance)
    }

    pub async fn save(&self, instance: &mut Instance) -> Result<i64> {
        instance.save(self.tof.backend().as_ref()).await
    }

    /// Delete a record and its translation rows.
    pub async fn delete(&self, instance: &mut Instance) -> Result<bool> {
        instance.remove(self.tof.backend().as_ref()).await
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("model", self.class.content_type())
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Lazily evaluated query over one model class.
#[derive(Clone)]
pub struct QuerySet {
    tof: Tof,
    class: Arc<ModelClass>,
    translation_aware: bool,
    spec: QuerySpec,
}

impl QuerySet {
    /// The logical query as it will be sent to the backend.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn is_translation_aware(&self) -> bool {
        self.translation_aware
    }

    /// Run `f` with a rewriter when this query set rewrites and the class
    /// has translated fields. Returns `None` on the fast path.
    fn with_rewriter<R>(&self, f: impl FnOnce(&Rewriter<'_>) -> R) -> Option<R> {
        if !self.translation_aware {
            return None;
        }
        let state = self.class.snapshot();
        let settings = self.tof.settings();
        let rewriter = Rewriter::new(&state, settings, self.tof.current_language());
        if !rewriter.is_needed() {
            return None;
        }
        Some(f(&rewriter))
    }

    fn conditions<K, V, I>(pairs: I) -> Vec<Condition>
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        pairs.into_iter().map(|(k, v)| Condition::new(k, v)).collect()
    }

    fn keyword_filter(&self, conditions: Vec<Condition>) -> Filter {
        match self.with_rewriter(|r| r.rewrite_pairs(conditions.clone())) {
            Some(filter) => filter,
            None => Filter::And(conditions.into_iter().map(Filter::Leaf).collect()),
        }
    }

    fn tree_filter(&self, filter: Filter) -> Filter {
        self.with_rewriter(|r| r.rewrite_tree(filter.clone()))
            .unwrap_or(filter)
    }

    /// Keep records matching every `(key, value)` pair.
    pub fn filter<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let filter = self.keyword_filter(Self::conditions(pairs));
        self.spec.filters.push(filter);
        self
    }

    /// Drop records matching every `(key, value)` pair.
    pub fn exclude<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let filter = self.keyword_filter(Self::conditions(pairs));
        self.spec.filters.push(filter.not());
        self
    }

    /// Keep records matching a filter tree.
    pub fn filter_q(mut self, filter: Filter) -> Self {
        let filter = self.tree_filter(filter);
        self.spec.filters.push(filter);
        self
    }

    /// Drop records matching a filter tree.
    pub fn exclude_q(mut self, filter: Filter) -> Self {
        let filter = self.tree_filter(filter);
        self.spec.filters.push(filter.not());
        self
    }

    /// Replace the ordering. Filters already applied are kept.
    ///
    /// Ordering by a translated field adds its `_<field>` annotation to
    /// this query set. The query is not rebuilt from the manager, so an
    /// earlier `filter` or `exclude` still applies.
    pub fn order_by<T, I>(mut self, terms: I) -> Self
    where
        T: Into<OrderTerm>,
        I: IntoIterator<Item = T>,
    {
        let terms: Vec<OrderTerm> = terms.into_iter().map(Into::into).collect();
        match self.with_rewriter(|r| r.rewrite_ordering(terms.clone())) {
            Some((ordering, annotations)) => {
                for annotation in annotations {
                    self.spec.annotate(annotation);
                }
                self.spec.ordering = ordering;
            }
            None => self.spec.ordering = terms,
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.spec.offset = Some(offset);
        self
    }

    /// Run the query and build instances.
    ///
    /// Only this model's translation rows are prefetched. Related models
    /// load theirs through [`Instance::load_translations`].
    pub async fn fetch(&self) -> Result<Vec<Instance>> {
        let backend = self.tof.backend();
        let rows = backend.select(self.class.definition(), &self.spec).await?;

        let mut prefetched: HashMap<i64, Vec<Translation>> = HashMap::new();
        if self.translation_aware && self.class.snapshot().has_capability(Capability::Translations) {
            let ids: Vec<i64> = rows.iter().filter_map(row_id).collect();
            for translation in backend
                .translations_for(self.class.content_type(), &ids)
                .await?
            {
                prefetched
                    .entry(translation.object_id)
                    .or_default()
                    .push(translation);
            }
        }
        debug!(
            model = %self.class.content_type(),
            rows = rows.len(),
            prefetched = prefetched.len(),
            "fetched"
        );

        let locale = self.tof.locale();
        rows.into_iter()
            .map(|row| {
                let translations = row_id(&row)
                    .and_then(|id| prefetched.remove(&id))
                    .unwrap_or_default();
                Instance::from_row(Arc::clone(&self.class), Arc::clone(&locale), row, translations)
            })
            .collect()
    }

    pub async fn count(&self) -> Result<usize> {
        self.tof
            .backend()
            .count(self.class.definition(), &self.spec)
            .await
    }

    pub async fn first(&self) -> Result<Option<Instance>> {
        let mut fetched = self.clone().limit(1).fetch().await?;
        Ok(fetched.pop())
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(self.first().await?.is_some())
    }

    /// The single record matching `pairs`.
    ///
    /// Fails with `NotFound` when nothing matches and with
    /// `MultipleObjectsReturned` when more than one record does.
    pub async fn get<K, V, I>(self, pairs: I) -> Result<Instance>
    where
        K: Into<String>,
        V: Into<FilterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let model = self.class.content_type().to_string();
        let query = self.filter(pairs);
        let query = match query.spec.limit {
            Some(limit) if limit <= MAX_GET_RESULTS => query,
            _ => query.limit(MAX_GET_RESULTS),
        };
        let mut fetched = query.fetch().await?;
        match fetched.len() {
            0 => Err(TofError::NotFound(model)),
            1 => fetched
                .pop()
                .ok_or_else(|| TofError::NotFound(model)),
            count => Err(TofError::MultipleObjectsReturned { model, count }),
        }
    }
}

impl std::fmt::Debug for QuerySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("model", self.class.content_type())
            .field("translation_aware", &self.translation_aware)
            .field("spec", &self.spec)
            .finish()
    }
}
