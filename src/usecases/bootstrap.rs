use std::{path::Path, sync::Arc};

use crate::{
    infra::{self, error::AppError, local_auth::LocalAuthBackend, storage_layout::StorageLayout},
    usecases::{context::AppContext, contracts::AuthBackend, session_sync::SessionSynchronizer},
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let context = build_context(config_path)?;
    infra::logging::init(&context.config.logging)?;

    Ok(context)
}

/// The session half of the composition root: one backend, one synchronizer.
pub struct SessionComposition {
    pub backend: Arc<LocalAuthBackend>,
    pub synchronizer: SessionSynchronizer,
}

pub fn compose_session(context: &AppContext) -> SessionComposition {
    let backend = Arc::new(LocalAuthBackend::new(context.layout.session_file()));
    let synchronizer = SessionSynchronizer::new(
        Arc::clone(&backend) as Arc<dyn AuthBackend>,
        context.config.startup.session_fetch_timeout(),
    );

    SessionComposition {
        backend,
        synchronizer,
    }
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config = infra::config::load(config_path)?;
    let layout = StorageLayout::resolve()?;
    layout.ensure_dirs()?;

    Ok(AppContext::new(config, layout))
}
