use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::module::Visibility;
use crate::models::quiz::Quiz;
use crate::models::user::{Caller, Role};
use crate::store::ModuleStore;

/// Boolean gate consulted before start, submit, grade and authoring.
/// A `false` answer becomes `Forbidden`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn can_take_quiz(&self, caller: &Caller, quiz: &Quiz) -> Result<bool>;
    async fn can_review_quiz(&self, caller: &Caller, quiz: &Quiz) -> Result<bool>;
}

/// Walks quiz -> module -> assigned teacher / enrollment. Any missing link
/// denies.
#[derive(Clone)]
pub struct ModuleAccess {
    modules: Arc<dyn ModuleStore>,
}

impl ModuleAccess {
    pub fn new(modules: Arc<dyn ModuleStore>) -> Self {
        Self { modules }
    }
}

#[async_trait]
impl AccessPolicy for ModuleAccess {
    async fn can_take_quiz(&self, caller: &Caller, quiz: &Quiz) -> Result<bool> {
        let Some(module) = self.modules.find_module(quiz.module_id).await? else {
            return Ok(false);
        };
        if !module.is_active {
            return Ok(false);
        }
        if caller.role == Role::Admin || module.assigned_teacher_id == Some(caller.user_id) {
            return Ok(true);
        }
        match module.visibility {
            Visibility::Public => Ok(true),
            Visibility::Private => {
                self.modules
                    .has_active_enrollment(module.id, caller.user_id)
                    .await
            }
        }
    }

    async fn can_review_quiz(&self, caller: &Caller, quiz: &Quiz) -> Result<bool> {
        let Some(module) = self.modules.find_module(quiz.module_id).await? else {
            return Ok(false);
        };
        Ok(match caller.role {
            Role::Admin => true,
            Role::Teacher => module.assigned_teacher_id == Some(caller.user_id),
            Role::Learner => false,
        })
    }
}
