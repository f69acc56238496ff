//! Where emitted records go.

use std::sync::{Arc, Mutex};

use dagc_core::types::Record;

use crate::runtime::{ExecError, Result};

/// Receives the records a unit emits on one output.
pub trait RecordSink: Send + Sync {
    fn accept(&self, record: Record) -> Result<()>;
}

/// Keeps every record it receives, in arrival order.
#[derive(Debug, Default)]
pub struct Collector {
    records: Mutex<Vec<Record>>,
}

impl Collector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of what arrived so far.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for Collector {
    fn accept(&self, record: Record) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| ExecError::Invalid("collector lock poisoned".into()))?
            .push(record);
        Ok(())
    }
}

/// Hands every record to each target; the last target gets the original.
/// With no targets records are dropped.
pub struct Fanout {
    targets: Vec<Arc<dyn RecordSink>>,
}

impl Fanout {
    pub fn new(targets: Vec<Arc<dyn RecordSink>>) -> Self {
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl RecordSink for Fanout {
    fn accept(&self, record: Record) -> Result<()> {
        let Some((last, rest)) = self.targets.split_last() else {
            return Ok(());
        };
        for t in rest {
            t.accept(record.clone())?;
        }
        last.accept(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagc_core::types::Value;

    fn item(v: i32) -> Record {
        let mut r = Record::new("Item", 1);
        r.set(0, Value::Int(v));
        r
    }

    #[test]
    fn fanout_copies_to_every_target() {
        let a = Collector::new();
        let b = Collector::new();
        let fan = Fanout::new(vec![a.clone() as Arc<dyn RecordSink>, b.clone()]);
        fan.accept(item(1)).unwrap();
        fan.accept(item(2)).unwrap();
        assert_eq!(a.records(), vec![item(1), item(2)]);
        assert_eq!(b.records(), a.records());
    }

    #[test]
    fn empty_fanout_drops() {
        let fan = Fanout::new(vec![]);
        assert!(fan.is_empty());
        fan.accept(item(1)).unwrap();
    }

    #[test]
    fn take_drains_the_collector() {
        let c = Collector::new();
        c.accept(item(7)).unwrap();
        assert_eq!(c.take().len(), 1);
        assert!(c.is_empty());
    }
}
