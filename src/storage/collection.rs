use crate::core::{Result, StoreError};
use crate::document::{
    Document, Filter, FindAndModifyOptions, ID_FIELD, Update, UpdateResult, document_key, key_of,
};
use std::collections::HashSet;

/// Documents of one collection, in insertion order, with a primary-key set.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    documents: Vec<Document>,
    keys: HashSet<String>,
    /// Bumped on every change; lets callers detect whether an operation wrote.
    revision: u64,
    dropped: bool,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Vec::new(),
            keys: HashSet::new(),
            revision: 0,
            dropped: false,
        }
    }

    /// Rebuild a collection from persisted documents.
    pub fn from_documents(name: impl Into<String>, documents: Vec<Document>) -> Result<Self> {
        let mut collection = Self::new(name);
        for document in documents {
            collection.insert(document)?;
        }
        collection.revision = 0;
        Ok(collection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub(crate) fn mark_dropped(&mut self) {
        self.dropped = true;
    }

    pub fn insert(&mut self, document: Document) -> Result<()> {
        let key = document_key(&document).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "Document inserted into '{}' has no '{}' field",
                self.name, ID_FIELD
            ))
        })?;
        if self.keys.contains(&key) {
            return Err(StoreError::DuplicateKey {
                collection: self.name.clone(),
                key,
            });
        }
        self.keys.insert(key);
        self.documents.push(document);
        self.revision += 1;
        Ok(())
    }

    /// Ordered insert; stops at the first failure.
    pub fn insert_many(&mut self, documents: Vec<Document>) -> Result<usize> {
        let mut inserted = 0;
        for document in documents {
            if let Err(err) = self.insert(document) {
                return Err(StoreError::BulkWrite {
                    inserted,
                    source: Box::new(err),
                });
            }
            inserted += 1;
        }
        Ok(inserted)
    }

    fn position(&self, filter: &Filter) -> Option<usize> {
        if let Some(id) = filter.id_value() {
            if !self.keys.contains(&key_of(id)) {
                return None;
            }
        }
        self.documents.iter().position(|doc| filter.matches(doc))
    }

    pub fn find(&self, filter: &Filter) -> Vec<Document> {
        self.documents
            .iter()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect()
    }

    pub fn count(&self, filter: &Filter) -> u64 {
        self.documents.iter().filter(|doc| filter.matches(doc)).count() as u64
    }

    pub fn update_first(&mut self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let Some(index) = self.position(filter) else {
            return Ok(UpdateResult::default());
        };
        let modified = update.apply(&mut self.documents[index])?;
        if modified {
            self.revision += 1;
        }
        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    pub fn find_and_modify(
        &mut self,
        filter: &Filter,
        update: &Update,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>> {
        match self.position(filter) {
            Some(index) => {
                let before = self.documents[index].clone();
                if update.apply(&mut self.documents[index])? {
                    self.revision += 1;
                }
                if options.return_new {
                    Ok(Some(self.documents[index].clone()))
                } else {
                    Ok(Some(before))
                }
            }
            None if options.upsert => {
                let created = update.apply_insert(filter)?;
                self.insert(created.clone())?;
                Ok(options.return_new.then_some(created))
            }
            None => Ok(None),
        }
    }
}
