//! Owns what the task screen shows and reconciles it with gateway results.
//!
//! Work is split in three steps so the event loop never holds state across a
//! suspension point: [`Synchronizer::handle`] turns an [`Intent`] into an
//! optional [`Request`], [`execute`] performs the request against a
//! [`Gateway`], and [`Synchronizer::apply`] folds the resulting
//! [`Completion`] back in. Task list fetches are tagged with the selection
//! generation that issued them; a completion carrying an old tag is dropped.
//! Creates and updates carry a [`SubmitTicket`] so their result only closes
//! the form that sent them.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::gateway::{Gateway, GatewayResult, Listing};
use crate::model::{FormError, Task, TaskFields, TaskForm, TaskId, User, UserId};
use crate::view::View;

/// Everything the presentation can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    LoadUsers,
    SelectUser(User),
    SelectionCleared,
    AddTaskRequested,
    EditTaskRequested(TaskId),
    ViewTaskRequested(TaskId),
    DeleteTaskRequested(TaskId),
    FormSubmitted(TaskForm),
    DeleteConfirmed,
    DeleteCancelled,
    ModalClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTag {
    pub generation: u64,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    View,
    Edit,
}

/// Ties a create or update to the form submission that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    pub tag: FetchTag,
    pub serial: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    LoadUsers,
    LoadTasks(FetchTag),
    GetTask {
        tag: FetchTag,
        id: TaskId,
        detail: Detail,
    },
    CreateTask {
        ticket: SubmitTicket,
        fields: TaskFields,
    },
    UpdateTask {
        ticket: SubmitTicket,
        id: TaskId,
        fields: TaskFields,
    },
    DeleteTask(TaskId),
}

#[derive(Debug)]
pub enum Completion {
    UsersLoaded(Listing<User>),
    TasksLoaded {
        tag: FetchTag,
        listing: Listing<Task>,
    },
    TaskFetched {
        tag: FetchTag,
        id: TaskId,
        detail: Detail,
        result: GatewayResult<Task>,
    },
    TaskCreated {
        ticket: SubmitTicket,
        result: GatewayResult<Task>,
    },
    TaskUpdated {
        ticket: SubmitTicket,
        id: TaskId,
        result: GatewayResult<Task>,
    },
    TaskDeleted {
        id: TaskId,
        result: GatewayResult<()>,
    },
}

pub async fn execute<G: Gateway>(gateway: &G, request: Request) -> Completion {
    match request {
        Request::LoadUsers => Completion::UsersLoaded(gateway.list_users().await),
        Request::LoadTasks(tag) => Completion::TasksLoaded {
            tag,
            listing: gateway.list_tasks().await,
        },
        Request::GetTask { tag, id, detail } => Completion::TaskFetched {
            tag,
            id,
            detail,
            result: gateway.get_task(id).await,
        },
        Request::CreateTask { ticket, fields } => Completion::TaskCreated {
            ticket,
            result: gateway.create_task(&fields).await,
        },
        Request::UpdateTask { ticket, id, fields } => Completion::TaskUpdated {
            ticket,
            id,
            result: gateway.update_task(id, &fields).await,
        },
        Request::DeleteTask(id) => Completion::TaskDeleted {
            id,
            result: gateway.delete_task(id).await,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    AddTask,
    ViewTask,
    EditTask,
    ConfirmDelete(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// `task` and `edit_mode` only mean something while a task dialog is open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub user: Option<User>,
    pub task: Option<Task>,
    pub edit_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DetailTicket {
    tag: FetchTag,
    id: TaskId,
    detail: Detail,
}

#[derive(Debug)]
pub struct Synchronizer {
    users: Vec<User>,
    tasks: Vec<Task>,
    selection: Selection,
    modal: Option<Modal>,
    settled: Phase,
    notification: Option<Notification>,
    generation: u64,
    pending_list: Option<FetchTag>,
    pending_detail: Option<DetailTicket>,
    submissions: u64,
    pending_submit: Option<SubmitTicket>,
    in_flight: usize,
    revision: watch::Sender<u64>,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Synchronizer {
            users: vec![],
            tasks: vec![],
            selection: Selection::default(),
            modal: None,
            settled: Phase::Idle,
            notification: None,
            generation: 0,
            pending_list: None,
            pending_detail: None,
            submissions: 0,
            pending_submit: None,
            in_flight: 0,
            revision,
        }
    }

    /// Ticks once for every change of state.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Always the selected user's tasks, in the order the service listed them.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn modal(&self) -> Option<Modal> {
        self.modal
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_list.is_some() || self.pending_detail.is_some() || self.in_flight > 0
    }

    pub fn phase(&self) -> Phase {
        if self.is_loading() {
            Phase::Loading
        } else {
            self.settled
        }
    }

    pub fn view(&self) -> View<'_> {
        View {
            users: &self.users,
            tasks: &self.tasks,
            selection: &self.selection,
            modal: self.modal,
            phase: self.phase(),
            loading: self.is_loading(),
            notification: self.notification.as_ref(),
        }
    }

    fn selected_user_id(&self) -> Option<UserId> {
        self.selection.user.as_ref().map(|u| u.id)
    }

    fn current_tag(&self) -> FetchTag {
        FetchTag {
            generation: self.generation,
            user_id: self.selected_user_id(),
        }
    }

    fn at_rest(&self) -> Phase {
        if self.selection.user.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.notification = Some(Notification {
            kind,
            message: message.into(),
        });
    }

    fn touch(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn close_task_dialog(&mut self) {
        self.modal = None;
        self.selection.task = None;
        self.selection.edit_mode = false;
        self.pending_detail = None;
        self.pending_submit = None;
    }

    fn reset_for(&mut self, user: Option<User>) {
        self.generation += 1;
        self.selection = Selection {
            user,
            task: None,
            edit_mode: false,
        };
        self.modal = None;
        self.tasks.clear();
        self.pending_detail = None;
        self.pending_submit = None;
    }

    /// Applies the synchronous part of an intent and returns the gateway call
    /// it needs, if any.
    pub fn handle(&mut self, intent: Intent) -> Option<Request> {
        let request = match intent {
            Intent::LoadUsers => {
                self.in_flight += 1;
                Some(Request::LoadUsers)
            }
            Intent::SelectUser(user) => {
                debug!(user_id = user.id, "selecting user");
                self.reset_for(Some(user));
                let tag = self.current_tag();
                self.pending_list = Some(tag);
                self.settled = Phase::Ready;
                Some(Request::LoadTasks(tag))
            }
            Intent::SelectionCleared => {
                self.reset_for(None);
                self.pending_list = None;
                self.settled = Phase::Idle;
                None
            }
            Intent::AddTaskRequested => {
                if self.selection.user.is_some() {
                    self.close_task_dialog();
                    self.modal = Some(Modal::AddTask);
                } else {
                    self.notify(NotificationKind::Error, FormError::NoUserSelected.to_string());
                }
                None
            }
            Intent::ViewTaskRequested(id) => Some(self.request_detail(id, Detail::View)),
            Intent::EditTaskRequested(id) => Some(self.request_detail(id, Detail::Edit)),
            Intent::DeleteTaskRequested(id) => {
                self.close_task_dialog();
                self.modal = Some(Modal::ConfirmDelete(id));
                None
            }
            Intent::DeleteConfirmed => match self.modal {
                Some(Modal::ConfirmDelete(id)) => {
                    self.modal = None;
                    self.in_flight += 1;
                    Some(Request::DeleteTask(id))
                }
                _ => None,
            },
            Intent::DeleteCancelled => {
                if matches!(self.modal, Some(Modal::ConfirmDelete(_))) {
                    self.modal = None;
                    self.settled = self.at_rest();
                }
                None
            }
            Intent::ModalClosed => {
                self.close_task_dialog();
                self.settled = self.at_rest();
                None
            }
            Intent::FormSubmitted(form) => self.submit(&form),
        };
        self.touch();
        request
    }

    fn request_detail(&mut self, id: TaskId, detail: Detail) -> Request {
        let ticket = DetailTicket {
            tag: self.current_tag(),
            id,
            detail,
        };
        self.pending_detail = Some(ticket);
        Request::GetTask {
            tag: ticket.tag,
            id,
            detail,
        }
    }

    /// At most one create or update is in flight per open form.
    fn submit(&mut self, form: &TaskForm) -> Option<Request> {
        if self.pending_submit.is_some() {
            debug!("form already submitted, ignoring");
            return None;
        }
        let ticket = SubmitTicket {
            tag: self.current_tag(),
            serial: self.submissions + 1,
        };
        let request = match (self.modal, &self.selection.task) {
            (Some(Modal::AddTask), _) => form
                .to_fields(self.selected_user_id())
                .map(|fields| Request::CreateTask { ticket, fields }),
            (Some(Modal::EditTask), Some(task)) => form
                .to_fields(None)
                .map(|fields| Request::UpdateTask {
                    ticket,
                    id: task.id,
                    fields,
                }),
            _ => return None,
        };
        match request {
            Ok(request) => {
                self.submissions = ticket.serial;
                self.pending_submit = Some(ticket);
                self.in_flight += 1;
                Some(request)
            }
            Err(error) => {
                self.notify(NotificationKind::Error, error.to_string());
                None
            }
        }
    }

    /// Folds a finished gateway call back into state.
    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::UsersLoaded(listing) => {
                self.finish_one();
                self.users = listing.items;
                if let Some(error) = listing.failure {
                    self.notify(NotificationKind::Error, format!("Error fetching users: {error}"));
                }
            }
            Completion::TasksLoaded { tag, listing } => {
                if self.pending_list != Some(tag) {
                    debug!(generation = tag.generation, user_id = ?tag.user_id, "discarding stale task list");
                    return;
                }
                self.pending_list = None;
                self.tasks = listing
                    .items
                    .into_iter()
                    .filter(|task| Some(task.user_id) == tag.user_id)
                    .collect();
                self.settled = Phase::Ready;
                if let Some(error) = listing.failure {
                    self.notify(NotificationKind::Error, format!("Error fetching tasks: {error}"));
                }
            }
            Completion::TaskFetched {
                tag,
                id,
                detail,
                result,
            } => {
                if self.pending_detail != Some(DetailTicket { tag, id, detail }) {
                    debug!(task_id = id, "discarding superseded task fetch");
                    return;
                }
                self.pending_detail = None;
                match result {
                    Ok(task) => {
                        self.pending_submit = None;
                        self.selection.task = Some(task);
                        self.selection.edit_mode = detail == Detail::Edit;
                        self.modal = Some(match detail {
                            Detail::View => Modal::ViewTask,
                            Detail::Edit => Modal::EditTask,
                        });
                        self.settled = Phase::Ready;
                    }
                    Err(error) => {
                        self.notify(NotificationKind::Error, format!("Error fetching task data: {error}"));
                        self.settled = Phase::Error;
                    }
                }
            }
            Completion::TaskCreated { ticket, result } => {
                self.finish_one();
                let current = self.settle_submission(ticket);
                if ticket.tag.generation != self.generation {
                    debug!(serial = ticket.serial, "discarding create issued for an earlier selection");
                    self.touch();
                    return;
                }
                match result {
                    Ok(task) => {
                        info!(task_id = task.id, user_id = task.user_id, "task created");
                        if Some(task.user_id) == self.selected_user_id() {
                            self.tasks.push(task);
                        } else {
                            debug!(task_id = task.id, "created task belongs to another user, not shown");
                        }
                        if current && self.modal == Some(Modal::AddTask) {
                            self.modal = None;
                        }
                        self.notify(NotificationKind::Success, "Task added successfully!");
                        self.settled = Phase::Ready;
                    }
                    Err(error) => {
                        self.notify(NotificationKind::Error, format!("Failed to add task: {error}"));
                        self.settled = Phase::Error;
                    }
                }
            }
            Completion::TaskUpdated { ticket, id, result } => {
                self.finish_one();
                let current = self.settle_submission(ticket);
                if ticket.tag.generation != self.generation {
                    debug!(task_id = id, "discarding update issued for an earlier selection");
                    self.touch();
                    return;
                }
                match result {
                    Ok(task) => {
                        info!(task_id = id, "task updated");
                        let belongs = Some(task.user_id) == self.selected_user_id();
                        if let Some(position) = self.tasks.iter().position(|t| t.id == task.id) {
                            if belongs {
                                self.tasks[position] = task;
                            } else {
                                self.tasks.remove(position);
                            }
                        }
                        if current {
                            self.close_task_dialog();
                        }
                        self.notify(NotificationKind::Success, "Task updated successfully!");
                        self.settled = Phase::Ready;
                    }
                    Err(error) => {
                        self.notify(NotificationKind::Error, format!("Failed to update task: {error}"));
                        self.settled = Phase::Error;
                    }
                }
            }
            Completion::TaskDeleted { id, result } => {
                self.finish_one();
                match result {
                    Ok(()) => {
                        info!(task_id = id, "task deleted");
                        self.tasks.retain(|t| t.id != id);
                        if self.selection.task.as_ref().map(|t| t.id) == Some(id) {
                            self.close_task_dialog();
                        }
                        self.notify(NotificationKind::Success, "Task deleted successfully!");
                        self.settled = Phase::Ready;
                    }
                    Err(error) => {
                        self.notify(NotificationKind::Error, format!("Failed to delete task: {error}"));
                        self.settled = Phase::Error;
                    }
                }
            }
        }
        self.touch();
    }

    fn finish_one(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// False when the form that sent `ticket` has since closed or been
    /// replaced.
    fn settle_submission(&mut self, ticket: SubmitTicket) -> bool {
        if self.pending_submit == Some(ticket) {
            self.pending_submit = None;
            true
        } else {
            false
        }
    }

    /// Runs an intent to completion. The terminal loop uses the split form
    /// instead so it can keep handling keys while a call is pending.
    pub async fn dispatch<G: Gateway>(&mut self, gateway: &G, intent: Intent) {
        if let Some(request) = self.handle(intent) {
            let completion = execute(gateway, request).await;
            self.apply(completion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::stub::{task, user, Operation, StubGateway};
    use crate::model::TaskStatus;
    use reqwest::StatusCode;
    use rstest::{fixture, rstest};

    fn ada() -> User {
        user(5, "Ada", "Lovelace", "ada@example.com")
    }

    fn alan() -> User {
        user(7, "Alan", "Turing", "alan@example.com")
    }

    #[fixture]
    fn gateway() -> StubGateway {
        StubGateway::new(
            vec![ada(), alan()],
            vec![
                task(1, 5, TaskStatus::Pending),
                task(2, 7, TaskStatus::Completed),
                task(3, 5, TaskStatus::InProgress),
                task(4, 5, TaskStatus::Cancelled),
            ],
        )
    }

    async fn ready_for_ada(gateway: &StubGateway) -> Synchronizer {
        let mut sync = Synchronizer::new();
        sync.dispatch(gateway, Intent::LoadUsers).await;
        sync.dispatch(gateway, Intent::SelectUser(ada())).await;
        sync
    }

    fn ids(sync: &Synchronizer) -> Vec<TaskId> {
        sync.tasks().iter().map(|t| t.id).collect()
    }

    fn form(title: &str) -> TaskForm {
        TaskForm {
            title: title.to_string(),
            ..TaskForm::default()
        }
    }

    fn assert_error_notification(sync: &Synchronizer) {
        assert_eq!(
            sync.notification().map(|n| n.kind),
            Some(NotificationKind::Error)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn selecting_a_user_shows_only_their_tasks_in_source_order(gateway: StubGateway) {
        let sync = ready_for_ada(&gateway).await;

        assert_eq!(sync.users().len(), 2);
        assert_eq!(ids(&sync), vec![1, 3, 4]);
        assert_eq!(sync.phase(), Phase::Ready);
        assert!(!sync.is_loading());
    }

    #[rstest]
    #[tokio::test]
    async fn selecting_starts_loading_until_the_list_arrives(gateway: StubGateway) {
        let mut sync = Synchronizer::new();
        let request = sync.handle(Intent::SelectUser(alan())).unwrap();

        assert_eq!(sync.phase(), Phase::Loading);
        sync.apply(execute(&gateway, request).await);
        assert_eq!(sync.phase(), Phase::Ready);
        assert_eq!(ids(&sync), vec![2]);
    }

    #[rstest]
    #[tokio::test]
    async fn clearing_the_selection_empties_the_visible_set(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;

        assert!(sync.handle(Intent::SelectionCleared).is_none());
        assert!(sync.tasks().is_empty());
        assert_eq!(sync.selection().user, None);
        assert_eq!(sync.phase(), Phase::Idle);
    }

    #[rstest]
    #[case::in_order(false)]
    #[case::reversed(true)]
    #[tokio::test]
    async fn later_selection_wins_regardless_of_arrival_order(
        gateway: StubGateway,
        #[case] reversed: bool,
    ) {
        let mut sync = Synchronizer::new();
        let first = sync.handle(Intent::SelectUser(ada())).unwrap();
        let second = sync.handle(Intent::SelectUser(alan())).unwrap();

        let first = execute(&gateway, first).await;
        let second = execute(&gateway, second).await;
        if reversed {
            sync.apply(second);
            sync.apply(first);
        } else {
            sync.apply(first);
            sync.apply(second);
        }

        assert_eq!(ids(&sync), vec![2]);
        assert_eq!(sync.selection().user.as_ref().map(|u| u.id), Some(7));
        assert!(!sync.is_loading());
    }

    #[rstest]
    #[tokio::test]
    async fn create_for_an_earlier_selection_leaves_the_new_form_open(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        sync.handle(Intent::AddTaskRequested);
        let create = sync
            .handle(Intent::FormSubmitted(form("For Ada")))
            .unwrap();
        sync.dispatch(&gateway, Intent::SelectUser(alan())).await;
        sync.handle(Intent::AddTaskRequested);
        let notification = sync.notification().cloned();

        sync.apply(execute(&gateway, create).await);

        assert_eq!(sync.modal(), Some(Modal::AddTask));
        assert_eq!(ids(&sync), vec![2]);
        assert_eq!(sync.notification().cloned(), notification);
        assert!(!sync.is_loading());
    }

    #[rstest]
    #[tokio::test]
    async fn create_from_a_closed_form_leaves_the_reopened_one_open(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        sync.handle(Intent::AddTaskRequested);
        let create = sync.handle(Intent::FormSubmitted(form("First"))).unwrap();
        sync.handle(Intent::ModalClosed);
        sync.handle(Intent::AddTaskRequested);

        sync.apply(execute(&gateway, create).await);

        assert_eq!(sync.modal(), Some(Modal::AddTask));
        assert_eq!(ids(&sync), vec![1, 3, 4, 5]);
    }

    #[rstest]
    #[tokio::test]
    async fn submitting_twice_sends_one_create(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        sync.handle(Intent::AddTaskRequested);
        let create = sync.handle(Intent::FormSubmitted(form("Once"))).unwrap();

        assert!(sync.handle(Intent::FormSubmitted(form("Once"))).is_none());
        sync.apply(execute(&gateway, create).await);

        assert_eq!(ids(&sync), vec![1, 3, 4, 5]);
        assert_eq!(
            gateway
                .calls()
                .iter()
                .filter(|operation| **operation == Operation::CreateTask)
                .count(),
            1
        );
        assert_eq!(sync.modal(), None);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_update_can_be_resubmitted(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        sync.dispatch(&gateway, Intent::EditTaskRequested(3)).await;
        gateway.fail(Operation::UpdateTask, StatusCode::UNPROCESSABLE_ENTITY);

        sync.dispatch(&gateway, Intent::FormSubmitted(form("Rejected")))
            .await;

        assert_eq!(sync.modal(), Some(Modal::EditTask));
        assert!(sync
            .handle(Intent::FormSubmitted(form("Again")))
            .is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn list_after_clear_is_discarded(gateway: StubGateway) {
        let mut sync = Synchronizer::new();
        let request = sync.handle(Intent::SelectUser(ada())).unwrap();
        sync.handle(Intent::SelectionCleared);

        sync.apply(execute(&gateway, request).await);
        assert!(sync.tasks().is_empty());
        assert_eq!(sync.phase(), Phase::Idle);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_task_list_is_ready_and_empty_with_an_error(gateway: StubGateway) {
        gateway.fail(Operation::ListTasks, StatusCode::INTERNAL_SERVER_ERROR);
        let sync = ready_for_ada(&gateway).await;

        assert!(sync.tasks().is_empty());
        assert_eq!(sync.phase(), Phase::Ready);
        assert_error_notification(&sync);
        assert!(sync
            .notification()
            .unwrap()
            .message
            .starts_with("Error fetching tasks"));
    }

    #[rstest]
    #[tokio::test]
    async fn failed_user_list_is_empty_with_an_error(gateway: StubGateway) {
        gateway.fail(Operation::ListUsers, StatusCode::SERVICE_UNAVAILABLE);
        let mut sync = Synchronizer::new();
        sync.dispatch(&gateway, Intent::LoadUsers).await;

        assert!(sync.users().is_empty());
        assert_error_notification(&sync);
        assert!(!sync.is_loading());
    }

    #[rstest]
    #[tokio::test]
    async fn adding_appends_the_server_task_and_closes_the_form(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        sync.dispatch(&gateway, Intent::AddTaskRequested).await;
        assert_eq!(sync.modal(), Some(Modal::AddTask));

        sync.dispatch(&gateway, Intent::FormSubmitted(form("Buy milk")))
            .await;

        assert_eq!(ids(&sync), vec![1, 3, 4, 5]);
        let added = sync.tasks().last().unwrap();
        assert_eq!(added.title, "Buy milk");
        assert_eq!(added.user_id, 5);
        assert_eq!(sync.modal(), None);
        assert_eq!(
            sync.notification(),
            Some(&Notification {
                kind: NotificationKind::Success,
                message: "Task added successfully!".to_string(),
            })
        );
    }

    #[rstest]
    #[tokio::test]
    async fn created_task_for_another_user_is_not_shown(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        gateway.reassign_next_create(7);
        sync.dispatch(&gateway, Intent::AddTaskRequested).await;
        sync.dispatch(&gateway, Intent::FormSubmitted(form("Elsewhere")))
            .await;

        assert_eq!(ids(&sync), vec![1, 3, 4]);
        assert_eq!(sync.modal(), None);
    }

    #[rstest]
    #[tokio::test]
    async fn adding_without_a_user_reports_an_error(gateway: StubGateway) {
        let mut sync = Synchronizer::new();
        sync.dispatch(&gateway, Intent::AddTaskRequested).await;

        assert_eq!(sync.modal(), None);
        assert_error_notification(&sync);
        assert!(gateway.calls().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn invalid_form_never_reaches_the_gateway(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        sync.dispatch(&gateway, Intent::AddTaskRequested).await;
        let calls = gateway.calls().len();

        sync.dispatch(&gateway, Intent::FormSubmitted(form(""))).await;

        assert_eq!(gateway.calls().len(), calls);
        assert_eq!(sync.modal(), Some(Modal::AddTask));
        assert_eq!(sync.notification().unwrap().message, "Title is required");
    }

    #[rstest]
    #[tokio::test]
    async fn editing_prefills_from_the_server_and_replaces_in_place(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        let before = sync.tasks().to_vec();

        sync.dispatch(&gateway, Intent::EditTaskRequested(3)).await;
        assert_eq!(sync.modal(), Some(Modal::EditTask));
        assert!(sync.selection().edit_mode);
        let mut edited = sync.view().form_seed();
        assert_eq!(edited.title, "Task 3");

        edited.title = "Renamed".to_string();
        edited.status = TaskStatus::Completed;
        sync.dispatch(&gateway, Intent::FormSubmitted(edited)).await;

        assert_eq!(ids(&sync), vec![1, 3, 4]);
        assert_eq!(sync.tasks()[1].title, "Renamed");
        assert_eq!(sync.tasks()[1].status, TaskStatus::Completed);
        assert_ne!(sync.tasks()[1].updated_at, before[1].updated_at);
        assert_eq!(sync.tasks()[0], before[0]);
        assert_eq!(sync.tasks()[2], before[2]);
        assert_eq!(sync.modal(), None);
        assert!(!sync.selection().edit_mode);
    }

    #[rstest]
    #[tokio::test]
    async fn deleting_needs_confirmation(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;

        assert!(sync.handle(Intent::DeleteTaskRequested(3)).is_none());
        assert_eq!(sync.modal(), Some(Modal::ConfirmDelete(3)));
        sync.dispatch(&gateway, Intent::DeleteConfirmed).await;

        assert_eq!(ids(&sync), vec![1, 4]);
        assert_eq!(sync.notification().unwrap().kind, NotificationKind::Success);
    }

    #[rstest]
    #[tokio::test]
    async fn cancelling_a_delete_makes_no_call(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        let calls = gateway.calls().len();

        sync.dispatch(&gateway, Intent::DeleteTaskRequested(3)).await;
        sync.dispatch(&gateway, Intent::DeleteCancelled).await;

        assert_eq!(gateway.calls().len(), calls);
        assert_eq!(ids(&sync), vec![1, 3, 4]);
        assert_eq!(sync.modal(), None);
        assert_eq!(sync.phase(), Phase::Ready);
    }

    #[rstest]
    #[tokio::test]
    async fn select_then_delete_the_only_task() {
        let gateway = StubGateway::new(
            vec![ada(), alan()],
            vec![task(1, 5, TaskStatus::Pending), task(2, 7, TaskStatus::Completed)],
        );
        let mut sync = ready_for_ada(&gateway).await;
        assert_eq!(ids(&sync), vec![1]);

        sync.dispatch(&gateway, Intent::DeleteTaskRequested(1)).await;
        sync.dispatch(&gateway, Intent::DeleteConfirmed).await;

        assert!(sync.tasks().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn viewing_fetches_the_current_server_copy(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        let edit = TaskForm {
            title: "Changed elsewhere".to_string(),
            ..TaskForm::default()
        };
        gateway
            .update_task(4, &edit.to_fields(None).unwrap())
            .await
            .unwrap();

        sync.dispatch(&gateway, Intent::ViewTaskRequested(4)).await;

        assert_eq!(sync.modal(), Some(Modal::ViewTask));
        assert!(!sync.selection().edit_mode);
        assert_eq!(
            sync.selection().task.as_ref().map(|t| t.title.as_str()),
            Some("Changed elsewhere")
        );

        sync.dispatch(&gateway, Intent::ModalClosed).await;
        assert_eq!(sync.selection().task, None);
        assert_eq!(sync.modal(), None);
    }

    #[rstest]
    #[tokio::test]
    async fn task_fetch_is_dropped_after_switching_user(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        let view = sync.handle(Intent::ViewTaskRequested(1)).unwrap();
        let list = sync.handle(Intent::SelectUser(alan())).unwrap();

        sync.apply(execute(&gateway, view).await);
        sync.apply(execute(&gateway, list).await);

        assert_eq!(sync.modal(), None);
        assert_eq!(sync.selection().task, None);
        assert_eq!(ids(&sync), vec![2]);
    }

    #[rstest]
    #[case::in_order(false)]
    #[case::reversed(true)]
    #[tokio::test]
    async fn later_task_fetch_replaces_an_earlier_one(
        gateway: StubGateway,
        #[case] reversed: bool,
    ) {
        let mut sync = ready_for_ada(&gateway).await;
        let view = sync.handle(Intent::ViewTaskRequested(1)).unwrap();
        let edit = sync.handle(Intent::EditTaskRequested(3)).unwrap();

        let view = execute(&gateway, view).await;
        let edit = execute(&gateway, edit).await;
        if reversed {
            sync.apply(edit);
            sync.apply(view);
        } else {
            sync.apply(view);
            sync.apply(edit);
        }

        assert_eq!(sync.modal(), Some(Modal::EditTask));
        assert_eq!(sync.selection().task.as_ref().map(|t| t.id), Some(3));
        assert!(sync.selection().edit_mode);
        assert!(!sync.is_loading());
    }

    #[rstest]
    #[tokio::test]
    async fn task_fetch_is_dropped_after_closing_the_dialog(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        let view = sync.handle(Intent::ViewTaskRequested(1)).unwrap();
        sync.handle(Intent::ModalClosed);

        sync.apply(execute(&gateway, view).await);

        assert_eq!(sync.modal(), None);
        assert_eq!(sync.selection().task, None);
        assert!(!sync.is_loading());
    }

    #[rstest]
    #[tokio::test]
    async fn updated_task_moved_to_another_user_is_removed(gateway: StubGateway) {
        let mut sync = ready_for_ada(&gateway).await;
        sync.dispatch(&gateway, Intent::EditTaskRequested(3)).await;
        gateway.reassign_next_update(7);
        let seed = sync.view().form_seed();

        sync.dispatch(&gateway, Intent::FormSubmitted(seed)).await;

        assert_eq!(ids(&sync), vec![1, 4]);
        assert_eq!(sync.modal(), None);
        assert_eq!(sync.notification().unwrap().kind, NotificationKind::Success);
    }

    #[rstest]
    #[case::view(Operation::GetTask)]
    #[case::create(Operation::CreateTask)]
    #[case::update(Operation::UpdateTask)]
    #[case::delete(Operation::DeleteTask)]
    #[tokio::test]
    async fn failed_calls_leave_the_visible_set_untouched(
        gateway: StubGateway,
        #[case] failing: Operation,
    ) {
        let mut sync = ready_for_ada(&gateway).await;
        if failing == Operation::UpdateTask {
            sync.dispatch(&gateway, Intent::EditTaskRequested(3)).await;
        }
        let before = sync.tasks().to_vec();
        gateway.fail(failing, StatusCode::UNPROCESSABLE_ENTITY);

        match failing {
            Operation::GetTask => {
                sync.dispatch(&gateway, Intent::ViewTaskRequested(3)).await;
                assert_eq!(sync.modal(), None);
            }
            Operation::CreateTask => {
                sync.dispatch(&gateway, Intent::AddTaskRequested).await;
                sync.dispatch(&gateway, Intent::FormSubmitted(form("Rejected")))
                    .await;
                assert_eq!(sync.modal(), Some(Modal::AddTask));
            }
            Operation::UpdateTask => {
                sync.dispatch(&gateway, Intent::FormSubmitted(form("Rejected")))
                    .await;
                assert_eq!(sync.modal(), Some(Modal::EditTask));
                assert!(sync.selection().edit_mode);
            }
            Operation::DeleteTask => {
                sync.dispatch(&gateway, Intent::DeleteTaskRequested(3)).await;
                sync.dispatch(&gateway, Intent::DeleteConfirmed).await;
            }
            Operation::ListUsers | Operation::ListTasks => unreachable!(),
        }

        assert_eq!(sync.tasks(), before.as_slice());
        assert_eq!(sync.phase(), Phase::Error);
        assert_error_notification(&sync);
        assert!(sync.notification().unwrap().message.contains("422"));
    }

    #[rstest]
    #[tokio::test]
    async fn every_change_bumps_the_revision(gateway: StubGateway) {
        let mut sync = Synchronizer::new();
        let mut revisions = sync.subscribe();
        let start = sync.revision();

        sync.dispatch(&gateway, Intent::SelectUser(ada())).await;

        assert_eq!(sync.revision(), start + 2);
        assert!(revisions.has_changed().unwrap());
        assert_eq!(*revisions.borrow_and_update(), start + 2);
    }
}
