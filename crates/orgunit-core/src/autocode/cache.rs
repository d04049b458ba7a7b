//! Compiled-program cache keyed by exact expression text.
//!
//! Append-only; failed compiles are never cached. Two concurrent
//! compiles of the same text both succeed and the last insert wins.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::cel::{CelEnv, CelProgram, CelType};
use super::rule_eval_failed;
use crate::error::OrgUnitResult;

pub struct CelProgramCache {
    env: CelEnv,
    programs: RwLock<HashMap<String, Arc<CelProgram>>>,
}

impl Default for CelProgramCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CelProgramCache {
    /// Cache over the auto-code environment.
    pub fn new() -> Self {
        Self::with_env(CelEnv::auto_code())
    }

    pub fn with_env(env: CelEnv) -> Self {
        Self {
            env,
            programs: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached program for `expr`, compiling it on a miss.
    pub fn get_or_compile(&self, expr: &str) -> OrgUnitResult<Arc<CelProgram>> {
        if let Some(program) = self
            .programs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(expr)
        {
            debug!(expr, "cel program cache hit");
            return Ok(Arc::clone(program));
        }

        let program = self
            .env
            .compile(expr, CelType::String)
            .map(Arc::new)
            .map_err(|e| rule_eval_failed(format!("compile {expr:?}: {e}")))?;

        self.programs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(expr.to_string(), Arc::clone(&program));
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.programs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
