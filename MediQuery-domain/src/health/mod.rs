//! Domain layer health check functionality
//! This module reports on the database pool and the LLM configuration

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use crate::llm::LlmConfig;
use mediquery_data::database::{self, DatabasePool};

/// System health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone)]
pub struct HealthComponent {
    pub status: ComponentStatus,
    pub details: Option<String>,
}

/// Represents the overall health of the system
#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub status: SystemStatus,
    /// Component name to health, currently `database` and `llm`
    pub components: HashMap<String, HealthComponent>,
}

impl SystemHealth {
    /// Overall status is the worst component status
    pub fn from_components(components: HashMap<String, HealthComponent>) -> Self {
        let statuses: Vec<ComponentStatus> = components.values().map(|c| c.status).collect();

        let status = if statuses.contains(&ComponentStatus::Unhealthy) {
            SystemStatus::Unhealthy
        } else if statuses.contains(&ComponentStatus::Degraded) {
            SystemStatus::Degraded
        } else {
            SystemStatus::Healthy
        };

        Self { status, components }
    }
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + std::fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Check the status of the database
    ///
    /// Returns:
    /// - Ok(true) if the database is reachable and has tables
    /// - Ok(false) if it is reachable but empty
    /// - Err if it is unavailable
    async fn check_database_status(&self) -> Result<bool, String>;
}

/// Health checks over the query pool and LLM configuration
#[derive(Debug, Clone)]
pub struct HealthService {
    pool: Option<DatabasePool>,
    llm_model: String,
    llm_configured: bool,
}

impl HealthService {
    pub fn new(pool: Option<DatabasePool>, llm_config: &LlmConfig) -> Self {
        Self {
            pool,
            llm_model: llm_config.model.clone(),
            llm_configured: llm_config.is_configured(),
        }
    }

    /// Use the globally initialized pool, if any
    pub fn from_global(llm_config: &LlmConfig) -> Self {
        Self::new(database::get_db_pool().ok(), llm_config)
    }

    fn llm_component(&self) -> HealthComponent {
        if self.llm_configured {
            HealthComponent {
                status: ComponentStatus::Healthy,
                details: Some(format!("Model {}", self.llm_model)),
            }
        } else {
            HealthComponent {
                status: ComponentStatus::Degraded,
                details: Some("LLM API key not configured".to_string()),
            }
        }
    }

    async fn database_component(&self) -> HealthComponent {
        let Some(pool) = self.pool.clone() else {
            return HealthComponent {
                status: ComponentStatus::Unhealthy,
                details: Some(database::DatabaseError::PoolNotInitialized.to_string()),
            };
        };

        let status = tokio::task::spawn_blocking(move || {
            let tables = pool.table_count()?;
            Ok::<_, database::DatabaseError>((database::get_connection_info(&pool), tables))
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result.map_err(|e| e.to_string()));

        match status {
            Ok((info, 0)) => HealthComponent {
                status: ComponentStatus::Degraded,
                details: Some(format!("{} has no tables", info)),
            },
            Ok((info, tables)) => HealthComponent {
                status: ComponentStatus::Healthy,
                details: Some(format!("{} with {} tables", info, tables)),
            },
            Err(e) => {
                warn!("Database health check failed: {}", e);
                HealthComponent {
                    status: ComponentStatus::Unhealthy,
                    details: Some(format!("Database connection error: {}", e)),
                }
            }
        }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let components = vec![
            ("database".to_string(), self.database_component().await),
            ("llm".to_string(), self.llm_component()),
        ]
        .into_iter()
        .collect();

        SystemHealth::from_components(components)
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        let component = self.database_component().await;
        match component.status {
            ComponentStatus::Healthy => Ok(true),
            ComponentStatus::Degraded => Ok(false),
            ComponentStatus::Unhealthy => Err(component.details.unwrap_or_default()),
        }
    }
}
