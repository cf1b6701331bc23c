//! What the presentation reads. Everything here is derived from synchronizer
//! state; nothing in this module changes it.

use crate::model::{Task, TaskForm, User};
use crate::sync::{Modal, Notification, Phase, Selection};

#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub users: &'a [User],
    pub tasks: &'a [Task],
    pub selection: &'a Selection,
    pub modal: Option<Modal>,
    pub phase: Phase,
    pub loading: bool,
    pub notification: Option<&'a Notification>,
}

impl<'a> View<'a> {
    /// Starting values for the add/edit form: the selected task when editing,
    /// blank with status pending otherwise.
    pub fn form_seed(&self) -> TaskForm {
        match (self.modal, &self.selection.task) {
            (Some(Modal::EditTask), Some(task)) => TaskForm::from(task),
            _ => TaskForm::default(),
        }
    }

    pub fn modal_title(&self) -> Option<&'static str> {
        self.modal.map(|modal| match modal {
            Modal::AddTask => "Add Task",
            Modal::EditTask => "Edit Task",
            Modal::ViewTask => "View Task",
            Modal::ConfirmDelete(_) => "Confirm Delete",
        })
    }

    pub fn is_selected(&self, user: &User) -> bool {
        self.selection.user.as_ref().map(|u| u.id) == Some(user.id)
    }

    pub fn users_matching(&self, query: &str) -> Vec<&'a User> {
        filter_users(self.users, query)
    }
}

/// Case-insensitive substring match on "first last" and on email.
pub fn matches_search(user: &User, query: &str) -> bool {
    let query = query.to_lowercase();
    user.full_name().to_lowercase().contains(&query) || user.email.to_lowercase().contains(&query)
}

pub fn filter_users<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    users.iter().filter(|u| matches_search(u, query)).collect()
}
