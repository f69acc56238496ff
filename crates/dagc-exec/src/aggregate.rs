//! Drives an aggregate operation through its companion units.
//!
//! Source records become partials through the mapper (Fold has none: its
//! records are already partials). The first partial of a group is copied,
//! every later one is combined into the copy, and the final partial goes to
//! the operation unit. `pre_aggregate` runs the same fold without the final
//! step, for combining before a shuffle.

use dagc_core::types::Record;

use crate::instance::{UnitInput, UnitInstance};
use crate::runtime::Result;

#[derive(Debug)]
pub struct AggregateDriver {
    mapper: Option<UnitInstance>,
    combiner: UnitInstance,
    copier: UnitInstance,
    operation: UnitInstance,
}

impl AggregateDriver {
    pub fn new(
        mapper: Option<UnitInstance>,
        combiner: UnitInstance,
        copier: UnitInstance,
        operation: UnitInstance,
    ) -> Self {
        Self {
            mapper,
            combiner,
            copier,
            operation,
        }
    }

    pub fn operation(&self) -> &UnitInstance {
        &self.operation
    }

    pub fn partial(&self, record: Record) -> Result<Record> {
        match &self.mapper {
            Some(m) => m.run_returning(UnitInput::Record(record)),
            None => Ok(record),
        }
    }

    pub fn combine(&self, left: Record, right: Record) -> Result<Record> {
        self.combiner.run_returning(UnitInput::Pair(left, right))
    }

    pub fn copy(&self, record: &Record) -> Result<Record> {
        self.copier.run_returning(UnitInput::Record(record.clone()))
    }

    /// Fold source records into one partial; `None` for an empty group.
    pub fn pre_aggregate(&self, records: impl IntoIterator<Item = Record>) -> Result<Option<Record>> {
        let partials = records.into_iter().map(|r| self.partial(r));
        self.fold(partials)
    }

    /// Fold a group of source records and hand the result to the operation.
    pub fn accept_group(&self, records: impl IntoIterator<Item = Record>) -> Result<()> {
        match self.pre_aggregate(records)? {
            Some(acc) => self.operation.run(UnitInput::Record(acc)).map(drop),
            None => Ok(()),
        }
    }

    /// Post-shuffle: partials already went through the mapper.
    pub fn accept_partials(&self, partials: impl IntoIterator<Item = Record>) -> Result<()> {
        match self.fold(partials.into_iter().map(Ok))? {
            Some(acc) => self.operation.run(UnitInput::Record(acc)).map(drop),
            None => Ok(()),
        }
    }

    fn fold(&self, partials: impl Iterator<Item = Result<Record>>) -> Result<Option<Record>> {
        let mut acc: Option<Record> = None;
        for p in partials {
            let p = p?;
            acc = Some(match acc {
                None => self.copy(&p)?,
                Some(a) => self.combine(a, p)?,
            });
        }
        Ok(acc)
    }
}
