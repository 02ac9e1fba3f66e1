// Adapter factory: closes over the three injected contexts, the column maps,
// and the options, validates them once, and produces a `ContextAdapter`.

use std::sync::Arc;

use authctx_core::db::columns::ColumnMaps;
use authctx_core::db::context::{Connection, DataContext};
use authctx_core::error::{AdapterError, AdapterResult};
use authctx_core::options::{AdapterOptions, UserCreationMode};

use crate::adapter::ContextAdapter;

/// One context per entity. Each is bound to the table holding that entity.
#[derive(Debug, Clone)]
pub struct AuthContexts {
    pub user: Arc<dyn DataContext>,
    pub session: Arc<dyn DataContext>,
    pub key: Arc<dyn DataContext>,
}

impl AuthContexts {
    pub fn new(
        user: Arc<dyn DataContext>,
        session: Arc<dyn DataContext>,
        key: Arc<dyn DataContext>,
    ) -> Self {
        Self { user, session, key }
    }
}

/// Builder for [`ContextAdapter`].
///
/// # Usage
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use authctx::{AdapterFactory, AuthContexts};
/// use authctx_core::{ColumnMaps, NamingConvention};
///
/// let adapter = AdapterFactory::new(AuthContexts::new(users, sessions, keys))
///     .columns(ColumnMaps::from_convention(NamingConvention::PascalCase))
///     .connection(Arc::new(connection))
///     .build()?;
/// ```
#[derive(Debug)]
pub struct AdapterFactory {
    contexts: AuthContexts,
    columns: ColumnMaps,
    options: AdapterOptions,
    connection: Option<Arc<dyn Connection>>,
}

impl AdapterFactory {
    /// Start from identity column maps and default options.
    pub fn new(contexts: AuthContexts) -> Self {
        Self {
            contexts,
            columns: ColumnMaps::default(),
            options: AdapterOptions::default(),
            connection: None,
        }
    }

    pub fn columns(mut self, columns: ColumnMaps) -> Self {
        self.columns = columns;
        self
    }

    pub fn options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    /// The connection the user and key contexts share; used to open the
    /// transaction scope for `set_user`.
    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Validate the configuration and produce the adapter.
    pub fn build(self) -> AdapterResult<ContextAdapter> {
        self.columns.validate()?;

        if self.options.user_creation == UserCreationMode::Transactional && self.connection.is_none() {
            return Err(AdapterError::Config(
                "transactional user creation requires a connection; supply one or use sequential mode".into(),
            ));
        }

        tracing::debug!(
            user_table = self.contexts.user.table(),
            session_table = self.contexts.session.table(),
            key_table = self.contexts.key.table(),
            user_creation = %self.options.user_creation,
            "building context adapter"
        );

        Ok(ContextAdapter::new(
            self.contexts,
            self.columns,
            self.options,
            self.connection,
        ))
    }
}
