use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex,
};

use derivative::Derivative;

use crate::{bits::CONDITION_BITS, error::StateError};

/// Maximum number of conditions, including [ConditionTable::ALWAYS].
pub const MAX_CONDITIONS: usize = 1 << CONDITION_BITS;

const NEVER_COMPUTED: u32 = u32::MAX;

/// A predicate deciding whether primitives using a state are drawn.
///
/// The predicate is evaluated at most once per frame.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MaterialCondition {
    /// Index stored in the render state key.
    pub index: u32,
    /// Whether the condition applies to block geometry.
    pub affect_blocks: bool,
    /// Whether the condition applies to item geometry.
    pub affect_items: bool,
    #[derivative(Debug = "ignore")]
    predicate: Box<dyn Fn() -> bool + Send + Sync>,
    computed_frame: AtomicU32,
    result: AtomicBool,
}

impl MaterialCondition {
    /// Returns the predicate's value for `frame`, evaluating it only on the first call
    /// for each frame.
    pub fn compute(&self, frame: u32) -> bool {
        if self.index == 0 {
            return true;
        }
        if self.computed_frame.load(Ordering::Acquire) == frame {
            return self.result.load(Ordering::Acquire);
        }
        let result = (self.predicate)();
        self.result.store(result, Ordering::Release);
        self.computed_frame.store(frame, Ordering::Release);
        result
    }
}

/// Append-only table of material conditions.
#[derive(Debug)]
pub struct ConditionTable {
    conditions: Mutex<Vec<Arc<MaterialCondition>>>,
}

impl ConditionTable {
    /// Index of the condition that is always true.
    pub const ALWAYS: u32 = 0;

    #[allow(missing_docs)]
    pub fn new() -> Self {
        let always = MaterialCondition {
            index: Self::ALWAYS,
            affect_blocks: true,
            affect_items: true,
            predicate: Box::new(|| true),
            computed_frame: AtomicU32::new(NEVER_COMPUTED),
            result: AtomicBool::new(true),
        };
        Self {
            conditions: Mutex::new(vec![Arc::new(always)]),
        }
    }

    /// Registers a condition and returns it with its assigned index.
    pub fn register(
        &self,
        predicate: impl Fn() -> bool + Send + Sync + 'static,
        affect_blocks: bool,
        affect_items: bool,
    ) -> Result<Arc<MaterialCondition>, StateError> {
        let mut conditions = self.conditions.lock().unwrap();
        if conditions.len() >= MAX_CONDITIONS {
            return Err(StateError::ConditionCapacityExceeded {
                capacity: MAX_CONDITIONS,
            });
        }
        let condition = Arc::new(MaterialCondition {
            index: conditions.len() as u32,
            affect_blocks,
            affect_items,
            predicate: Box::new(predicate),
            computed_frame: AtomicU32::new(NEVER_COMPUTED),
            result: AtomicBool::new(false),
        });
        conditions.push(Arc::clone(&condition));
        Ok(condition)
    }

    #[allow(missing_docs)]
    pub fn get(&self, index: u32) -> Option<Arc<MaterialCondition>> {
        self.conditions.lock().unwrap().get(index as usize).cloned()
    }

    /// Evaluates condition `index` for `frame`. Unknown indices are treated as always true.
    pub fn is_active(&self, index: u32, frame: u32) -> bool {
        self.get(index)
            .map_or(true, |condition| condition.compute(frame))
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.conditions.lock().unwrap().len()
    }

    /// Always false; [Self::ALWAYS] always exists.
    pub fn is_empty(&self) -> bool {
        false
    }
}
