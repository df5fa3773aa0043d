// Tessera
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Audit logging for ACL and authentication operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditEventType {
    AclCreated,
    AclDeleted,
    PermissionGranted,
    PermissionRevoked,
    EntryInserted,
    EntryDeleted,
    SidRemoved,
    PermissionCheck,
    AuthenticationAttempt,
    TokenRefreshed,
    RefreshTokenExpired,
}

/// Audit event result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditResult {
    Success,
    Failure,
    Denied,
}

/// Audit event entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,

    pub event_type: AuditEventType,

    pub timestamp: DateTime<Utc>,

    /// Who performed the action
    pub actor: String,

    /// Sid or subject the action applied to
    pub target: Option<String>,

    /// Object identity, when applicable
    pub resource: Option<String>,

    /// Permission or operation name
    pub action: Option<String>,

    pub result: AuditResult,

    pub details: HashMap<String, String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, actor: impl Into<String>, result: AuditResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            actor: actor.into(),
            target: None,
            resource: None,
            action: None,
            result,
            details: HashMap::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_resource_action(mut self, resource: impl Into<String>, action: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self.action = Some(action.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Aggregate counts over the retained events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total_events: usize,
    pub successes: usize,
    pub failures: usize,
    pub denials: usize,
    pub by_type: HashMap<AuditEventType, usize>,
}

/// Bounded in-memory audit log mirrored to tracing
#[derive(Debug)]
pub struct AuditLogger {
    events: Arc<RwLock<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::with_max_events(10_000)
    }

    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            max_events,
        }
    }

    /// Log an audit event
    pub async fn log_event(&self, event: AuditEvent) {
        match event.result {
            AuditResult::Success => {
                info!(
                    event_type = ?event.event_type,
                    actor = %event.actor,
                    target = ?event.target,
                    resource = ?event.resource,
                    action = ?event.action,
                    "Audit event: {:?}", event.event_type
                );
            }
            AuditResult::Failure | AuditResult::Denied => {
                warn!(
                    event_type = ?event.event_type,
                    actor = %event.actor,
                    target = ?event.target,
                    resource = ?event.resource,
                    action = ?event.action,
                    result = ?event.result,
                    "Audit event: {:?} - {:?}", event.event_type, event.result
                );
            }
        }

        let mut events = self.events.write().await;
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub async fn log_acl_created(&self, resource: &str, owner: &str) {
        let event = AuditEvent::new(AuditEventType::AclCreated, owner, AuditResult::Success).with_resource_action(resource, "create_acl");
        self.log_event(event).await;
    }

    pub async fn log_acl_deleted(&self, resource: &str) {
        let event = AuditEvent::new(AuditEventType::AclDeleted, "system", AuditResult::Success).with_resource_action(resource, "delete_acl");
        self.log_event(event).await;
    }

    pub async fn log_permissions_granted(&self, resource: &str, sid: &str, permissions: &str, appended: usize) {
        let event = AuditEvent::new(AuditEventType::PermissionGranted, "system", AuditResult::Success)
            .with_target(sid)
            .with_resource_action(resource, permissions)
            .with_detail("appended", appended.to_string());
        self.log_event(event).await;
    }

    pub async fn log_permissions_revoked(&self, resource: &str, sid: &str, permissions: &str, removed: usize) {
        let event = AuditEvent::new(AuditEventType::PermissionRevoked, "system", AuditResult::Success)
            .with_target(sid)
            .with_resource_action(resource, permissions)
            .with_detail("removed", removed.to_string());
        self.log_event(event).await;
    }

    pub async fn log_entry_inserted(&self, resource: &str, sid: &str, permission: &str, index: usize) {
        let event = AuditEvent::new(AuditEventType::EntryInserted, "system", AuditResult::Success)
            .with_target(sid)
            .with_resource_action(resource, permission)
            .with_detail("index", index.to_string());
        self.log_event(event).await;
    }

    pub async fn log_entry_deleted(&self, resource: &str, sid: &str, permission: &str, index: usize) {
        let event = AuditEvent::new(AuditEventType::EntryDeleted, "system", AuditResult::Success)
            .with_target(sid)
            .with_resource_action(resource, permission)
            .with_detail("index", index.to_string());
        self.log_event(event).await;
    }

    pub async fn log_sid_removed(&self, resource: &str, sid: &str, removed: usize) {
        let event = AuditEvent::new(AuditEventType::SidRemoved, "system", AuditResult::Success)
            .with_target(sid)
            .with_resource_action(resource, "remove_sid")
            .with_detail("removed", removed.to_string());
        self.log_event(event).await;
    }

    pub async fn log_permission_check(&self, principal: &str, resource: &str, permission: &str, granted: bool) {
        let result = if granted { AuditResult::Success } else { AuditResult::Denied };
        let event = AuditEvent::new(AuditEventType::PermissionCheck, principal, result).with_resource_action(resource, permission);
        self.log_event(event).await;
    }

    pub async fn log_authentication_attempt(&self, subject: &str, success: bool) {
        let result = if success { AuditResult::Success } else { AuditResult::Failure };
        let event = AuditEvent::new(AuditEventType::AuthenticationAttempt, subject, result);
        self.log_event(event).await;
    }

    pub async fn log_token_refresh(&self, subject: &str, success: bool) {
        let result = if success { AuditResult::Success } else { AuditResult::Failure };
        let event = AuditEvent::new(AuditEventType::TokenRefreshed, subject, result);
        self.log_event(event).await;
    }

    pub async fn log_refresh_token_expired(&self, subject: &str) {
        let event = AuditEvent::new(AuditEventType::RefreshTokenExpired, subject, AuditResult::Failure);
        self.log_event(event).await;
    }

    /// Most recent events, newest last
    pub async fn get_events(&self, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        match limit {
            Some(limit) => events.iter().rev().take(limit).rev().cloned().collect(),
            None => events.iter().cloned().collect(),
        }
    }

    pub async fn get_actor_events(&self, actor: &str, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        let matching = events.iter().filter(|event| event.actor == actor);
        match limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        }
    }

    pub async fn get_events_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        events.iter().filter(|event| event.event_type == event_type).cloned().collect()
    }

    pub async fn clear_events(&self) {
        self.events.write().await.clear();
    }

    pub async fn get_statistics(&self) -> AuditStatistics {
        let events = self.events.read().await;
        let mut stats = AuditStatistics {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter() {
            match event.result {
                AuditResult::Success => stats.successes += 1,
                AuditResult::Failure => stats.failures += 1,
                AuditResult::Denied => stats.denials += 1,
            }
            *stats.by_type.entry(event.event_type).or_insert(0) += 1;
        }

        stats
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_audit_logger() {
        let logger = AuditLogger::new();

        logger.log_permission_check("a@example.com", "workspace:1", "READ", true).await;
        logger.log_permission_check("b@example.com", "workspace:1", "WRITE", false).await;
        logger.log_authentication_attempt("b@example.com", false).await;

        let stats = logger.get_statistics().await;
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.denials, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.by_type.get(&AuditEventType::PermissionCheck), Some(&2));

        let b_events = logger.get_actor_events("b@example.com", None).await;
        assert_eq!(b_events.len(), 2);
    }

    #[tokio::test]
    async fn test_audit_logger_limits() {
        let logger = AuditLogger::with_max_events(3);

        for i in 0..5 {
            logger.log_sid_removed(&format!("workspace:{}", i), "principal:x", 1).await;
        }

        let events = logger.get_events(None).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].resource.as_deref(), Some("workspace:2"));

        let last = logger.get_events(Some(1)).await;
        assert_eq!(last[0].resource.as_deref(), Some("workspace:4"));
    }

    #[tokio::test]
    async fn test_full_log_drops_oldest_one_at_a_time() {
        let logger = AuditLogger::with_max_events(2);

        for i in 0..50 {
            logger.log_permission_check("a@example.com", &format!("workspace:{}", i), "READ", true).await;
            assert!(logger.get_events(None).await.len() <= 2);
        }

        let events = logger.get_events(None).await;
        let resources: Vec<_> = events.iter().map(|e| e.resource.clone().unwrap_or_default()).collect();
        assert_eq!(resources, vec!["workspace:48", "workspace:49"]);
        assert_eq!(logger.get_statistics().await.total_events, 2);
    }
}
