//! Shared helpers for integration tests

#![allow(dead_code)]

use cretoai_rbac::{Rbac, RbacConfig, Result};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine holding roles `admin`, `user` and permissions `create_page`,
/// `delete_user`, with `user -> create_page`, `admin -> user`,
/// `admin -> delete_user`
pub async fn page_engine() -> Result<Rbac> {
    init_tracing();

    let rbac = Rbac::with_config(RbacConfig::default())?;
    let admin = rbac.create_role("admin", true).await?;
    let user = rbac.create_role("user", true).await?;
    let create_page = rbac.create_permission("create", "page", true).await?;
    let delete_user = rbac.create_permission("delete", "user", true).await?;

    rbac.grant(&user, &create_page).await?;
    rbac.grant(&admin, &user).await?;
    rbac.grant(&admin, &delete_user).await?;

    Ok(rbac)
}
