// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of the engine from configuration.
//!
//! Every subcommand works against the same SQLite store, so `serve` and the
//! client commands build their service the same way; only `serve` starts it.

use std::sync::Arc;

use agentscan_agents::AgentManager;
use agentscan_config::AgentscanConfig;
use agentscan_core::AgentscanError;
use agentscan_orchestrator::{OrchestrationService, ServiceSettings};
use agentscan_queue::QueueSettings;
use agentscan_storage::{Database, SqliteJobQueue, SqliteScanRepository};
use tracing::info;

use crate::command_agent::CommandAgent;

/// Open the store, register the configured agents, and build the service.
pub async fn open(config: &AgentscanConfig) -> Result<OrchestrationService, AgentscanError> {
    let db = Database::from_config(&config.storage).await?;

    let agents = Arc::new(AgentManager::from_config(&config.agent_manager));
    for agent_config in &config.agents {
        let agent = CommandAgent::from_config(agent_config)?;
        agents
            .register_agent(agent_config.name.clone(), Arc::new(agent))
            .await?;
    }
    info!(count = config.agents.len(), "command agents registered");

    let queue = Arc::new(SqliteJobQueue::new(
        db.clone(),
        QueueSettings::from(&config.queue),
    ));
    let repository = Arc::new(SqliteScanRepository::new(db));

    Ok(OrchestrationService::new(
        repository,
        queue,
        agents,
        ServiceSettings::from(config),
    ))
}
