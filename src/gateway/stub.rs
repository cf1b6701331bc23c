//! In-memory stand-in for the remote service.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;

use super::{Gateway, GatewayError, GatewayResult};
use crate::model::{Task, TaskFields, TaskId, TaskStatus, User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListUsers,
    ListTasks,
    GetTask,
    CreateTask,
    UpdateTask,
    DeleteTask,
}

#[derive(Debug, Default)]
struct Store {
    users: Vec<User>,
    tasks: Vec<Task>,
    next_id: TaskId,
    failures: HashMap<Operation, StatusCode>,
    calls: Vec<Operation>,
    /// Overrides the owner of the next created task.
    reassign_next_create: Option<UserId>,
    reassign_next_update: Option<UserId>,
}

#[derive(Debug, Default)]
pub struct StubGateway {
    store: Mutex<Store>,
}

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 8, 0, 0).unwrap()
}

pub fn user(id: UserId, first_name: &str, last_name: &str, email: &str) -> User {
    User {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        password: "secret".to_string(),
        created_at: timestamp(),
        updated_at: timestamp(),
    }
}

pub fn task(id: TaskId, user_id: UserId, status: TaskStatus) -> Task {
    Task {
        id,
        title: format!("Task {id}"),
        description: String::new(),
        status,
        due_date: None,
        start_date: None,
        created_at: timestamp(),
        updated_at: timestamp(),
        user_id,
    }
}

impl StubGateway {
    pub fn new(users: Vec<User>, tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        StubGateway {
            store: Mutex::new(Store {
                users,
                tasks,
                next_id,
                ..Store::default()
            }),
        }
    }

    /// Every later call of `operation` answers with `status`.
    pub fn fail(&self, operation: Operation, status: StatusCode) {
        self.lock().failures.insert(operation, status);
    }

    pub fn reassign_next_create(&self, user_id: UserId) {
        self.lock().reassign_next_create = Some(user_id);
    }

    /// The next updated task comes back owned by `user_id`.
    pub fn reassign_next_update(&self, user_id: UserId) {
        self.lock().reassign_next_update = Some(user_id);
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    fn call<T>(
        &self,
        operation: Operation,
        apply: impl FnOnce(&mut Store) -> GatewayResult<T>,
    ) -> GatewayResult<T> {
        let mut store = self.lock();
        store.calls.push(operation);
        if let Some(status) = store.failures.get(&operation).copied() {
            return Err(GatewayError::Http { status });
        }
        apply(&mut store)
    }
}

impl Gateway for StubGateway {
    async fn fetch_users(&self) -> GatewayResult<Vec<User>> {
        self.call(Operation::ListUsers, |store| Ok(store.users.clone()))
    }

    async fn fetch_tasks(&self) -> GatewayResult<Vec<Task>> {
        self.call(Operation::ListTasks, |store| Ok(store.tasks.clone()))
    }

    async fn get_task(&self, id: TaskId) -> GatewayResult<Task> {
        self.call(Operation::GetTask, |store| {
            store.tasks.iter().find(|t| t.id == id).cloned().ok_or(
                GatewayError::NotFound {
                    id,
                    status: StatusCode::NOT_FOUND,
                },
            )
        })
        .map_err(|error| match error {
            GatewayError::Http { status } => GatewayError::NotFound { id, status },
            other => other,
        })
    }

    async fn create_task(&self, fields: &TaskFields) -> GatewayResult<Task> {
        self.call(Operation::CreateTask, |store| {
            let user_id = store
                .reassign_next_create
                .take()
                .or(fields.user_id)
                .ok_or(GatewayError::Http {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                })?;
            let created = Task {
                id: store.next_id,
                title: fields.title.clone(),
                description: fields.description.clone(),
                status: fields.status,
                due_date: fields.due_date,
                start_date: fields.start_date,
                created_at: timestamp(),
                updated_at: timestamp(),
                user_id,
            };
            store.next_id += 1;
            store.tasks.push(created.clone());
            Ok(created)
        })
    }

    async fn update_task(&self, id: TaskId, fields: &TaskFields) -> GatewayResult<Task> {
        self.call(Operation::UpdateTask, |store| {
            let owner = store.reassign_next_update.take();
            let existing = store
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(GatewayError::Http {
                    status: StatusCode::NOT_FOUND,
                })?;
            existing.title = fields.title.clone();
            existing.description = fields.description.clone();
            existing.status = fields.status;
            existing.due_date = fields.due_date;
            existing.start_date = fields.start_date;
            if let Some(owner) = owner {
                existing.user_id = owner;
            }
            existing.updated_at = existing.updated_at + chrono::Duration::minutes(1);
            Ok(existing.clone())
        })
    }

    async fn delete_task(&self, id: TaskId) -> GatewayResult<()> {
        self.call(Operation::DeleteTask, |store| {
            let before = store.tasks.len();
            store.tasks.retain(|t| t.id != id);
            if store.tasks.len() == before {
                return Err(GatewayError::Http {
                    status: StatusCode::NOT_FOUND,
                });
            }
            Ok(())
        })
    }
}
