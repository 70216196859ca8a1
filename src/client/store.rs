use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::api::{ApiError, NewTaskPayload, TaskApi, TaskItem, TaskPatch};

/// Where the store sends the user when the server drops the session.
pub const LOGIN_PATH: &str = "/login";

/// Redirect hook for a lost session.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Which tasks `visible_tasks` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Pending,
    Completed,
}

impl Filter {
    pub fn matches(self, task: &TaskItem) -> bool {
        match self {
            Filter::All => true,
            Filter::Pending => !task.completed,
            Filter::Completed => task.completed,
        }
    }
}

/// A store action that did not go through. `Display` is the message shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    Unauthorized,
    Failed(&'static str),
    Network,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActionError::Unauthorized => write!(f, "Unauthorized"),
            ActionError::Failed(message) => write!(f, "{}", message),
            ActionError::Network => write!(f, "Network error"),
        }
    }
}

impl std::error::Error for ActionError {}

pub type ActionResult<T> = Result<T, ActionError>;

const FETCH_FAILED: &str = "Failed to fetch tasks";
const ADD_FAILED: &str = "Failed to add task";
const TOGGLE_FAILED: &str = "Failed to toggle task";
const DELETE_FAILED: &str = "Failed to delete task";
const UPDATE_FAILED: &str = "Failed to update task";

#[derive(Debug, Default)]
struct State {
    tasks: Vec<TaskItem>,
    loading: bool,
    adding: bool,
    busy: HashSet<String>,
    filter: Filter,
}

enum Hold {
    Loading,
    Adding,
    Busy(String),
}

/// Clears a loading/adding/busy flag when the action that raised it ends,
/// whichever way it ends.
struct HoldGuard<'a> {
    state: &'a Mutex<State>,
    hold: Hold,
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &self.hold {
            Hold::Loading => state.loading = false,
            Hold::Adding => state.adding = false,
            Hold::Busy(id) => {
                state.busy.remove(id);
            }
        }
    }
}

/// Client-side mirror of the user's task list.
///
/// Add, toggle and delete show up locally before the server answers and are
/// rolled back or reconciled when it refuses. A 401 from any call sends the
/// user to [`LOGIN_PATH`].
pub struct TaskStore<A> {
    api: A,
    navigator: Arc<dyn Navigator>,
    state: Mutex<State>,
}

impl<A: TaskApi> TaskStore<A> {
    pub fn new(api: A, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            api,
            navigator,
            state: Mutex::new(State::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hold(&self, hold: Hold) -> HoldGuard<'_> {
        {
            let mut state = self.state();
            match &hold {
                Hold::Loading => state.loading = true,
                Hold::Adding => state.adding = true,
                Hold::Busy(id) => {
                    state.busy.insert(id.clone());
                }
            }
        }
        HoldGuard {
            state: &self.state,
            hold,
        }
    }

    pub fn tasks(&self) -> Vec<TaskItem> {
        self.state().tasks.clone()
    }

    pub fn visible_tasks(&self) -> Vec<TaskItem> {
        let state = self.state();
        state
            .tasks
            .iter()
            .filter(|task| state.filter.matches(task))
            .cloned()
            .collect()
    }

    pub fn filter(&self) -> Filter {
        self.state().filter
    }

    pub fn set_filter(&self, filter: Filter) {
        self.state().filter = filter;
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn is_adding(&self) -> bool {
        self.state().adding
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.state().busy.contains(id)
    }

    fn fail(&self, error: ApiError, message: &'static str) -> ActionError {
        match error {
            ApiError::Unauthorized => {
                log::info!("session rejected, redirecting to {}", LOGIN_PATH);
                self.navigator.redirect(LOGIN_PATH);
                ActionError::Unauthorized
            }
            ApiError::Network(e) => {
                log::warn!("{}: {}", message, e);
                ActionError::Network
            }
            other => {
                log::warn!("{}: {}", message, other);
                ActionError::Failed(message)
            }
        }
    }

    /// Re-reads the list from the server after a rejected optimistic change.
    /// A 401 here still redirects; other failures leave the local list as is.
    async fn reconcile(&self) {
        if let Err(e) = self.fetch_all().await {
            log::debug!("reconcile after failed action did not complete: {}", e);
        }
    }

    fn replace(&self, task: &TaskItem) {
        let mut state = self.state();
        if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task.clone();
        }
    }

    /// Replaces the local list with the server's.
    pub async fn fetch_all(&self) -> ActionResult<Vec<TaskItem>> {
        let _loading = self.hold(Hold::Loading);
        match self.api.list().await {
            Ok(tasks) => {
                self.state().tasks = tasks.clone();
                Ok(tasks)
            }
            Err(e) => Err(self.fail(e, FETCH_FAILED)),
        }
    }

    /// Shows a placeholder at the head of the list right away, then swaps in
    /// the server's record. The placeholder is removed on any failure.
    pub async fn add(
        &self,
        title: &str,
        description: Option<&str>,
        due_date: Option<&str>,
    ) -> ActionResult<TaskItem> {
        let _adding = self.hold(Hold::Adding);

        let description = description.filter(|d| !d.is_empty()).map(str::to_owned);
        let due_date = due_date.filter(|d| !d.is_empty()).map(str::to_owned);
        let temp_id = format!("tmp-{}", Uuid::new_v4());

        self.state().tasks.insert(
            0,
            TaskItem {
                id: temp_id.clone(),
                title: title.to_owned(),
                description: description.clone(),
                completed: false,
                due_date: due_date.clone(),
            },
        );

        let payload = NewTaskPayload {
            title: title.to_owned(),
            description,
            due_date,
        };

        match self.api.create(&payload).await {
            Ok(task) => {
                let mut state = self.state();
                match state.tasks.iter().position(|t| t.id == temp_id) {
                    Some(index) => state.tasks[index] = task.clone(),
                    // A fetch replaced the list while the request was in flight.
                    None if !state.tasks.iter().any(|t| t.id == task.id) => {
                        state.tasks.insert(0, task.clone())
                    }
                    None => {}
                }
                Ok(task)
            }
            Err(e) => {
                self.state().tasks.retain(|t| t.id != temp_id);
                Err(self.fail(e, ADD_FAILED))
            }
        }
    }

    /// Flips `completed` locally, then on the server. On refusal the list is
    /// re-read from the server.
    pub async fn toggle(&self, id: &str, completed: bool) -> ActionResult<TaskItem> {
        let _busy = self.hold(Hold::Busy(id.to_owned()));

        if let Some(task) = self.state().tasks.iter_mut().find(|t| t.id == id) {
            task.completed = completed;
        }

        let patch = TaskPatch {
            completed: Some(completed),
            ..TaskPatch::default()
        };
        match self.api.update(id, &patch).await {
            Ok(task) => {
                self.replace(&task);
                Ok(task)
            }
            Err(ApiError::Unauthorized) => Err(self.fail(ApiError::Unauthorized, TOGGLE_FAILED)),
            Err(e) => {
                let error = self.fail(e, TOGGLE_FAILED);
                self.reconcile().await;
                Err(error)
            }
        }
    }

    /// Drops the task locally, then on the server. On refusal the list is
    /// re-read from the server.
    pub async fn remove(&self, id: &str) -> ActionResult<()> {
        let _busy = self.hold(Hold::Busy(id.to_owned()));

        self.state().tasks.retain(|t| t.id != id);

        match self.api.delete(id).await {
            Ok(()) => Ok(()),
            Err(ApiError::Unauthorized) => Err(self.fail(ApiError::Unauthorized, DELETE_FAILED)),
            Err(e) => {
                let error = self.fail(e, DELETE_FAILED);
                self.reconcile().await;
                Err(error)
            }
        }
    }

    /// Sends the patch and applies the server's answer. Nothing changes
    /// locally before the server accepts.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> ActionResult<TaskItem> {
        let _busy = self.hold(Hold::Busy(id.to_owned()));

        match self.api.update(id, &patch).await {
            Ok(task) => {
                self.replace(&task);
                Ok(task)
            }
            Err(e) => Err(self.fail(e, UPDATE_FAILED)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// In-process stand-in for the task endpoints.
    #[derive(Default)]
    struct FakeApi {
        tasks: Mutex<Vec<TaskItem>>,
        failures: Mutex<HashMap<&'static str, ApiError>>,
        gated: AtomicBool,
        gate: Notify,
        next_id: AtomicUsize,
        list_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with_tasks(tasks: Vec<TaskItem>) -> Arc<Self> {
            let api = Self::default();
            *api.tasks.lock().unwrap() = tasks;
            Arc::new(api)
        }

        fn fail(&self, op: &'static str, error: ApiError) {
            self.failures.lock().unwrap().insert(op, error);
        }

        fn hold_requests(&self) {
            self.gated.store(true, Ordering::SeqCst);
        }

        fn release(&self) {
            self.gate.notify_one();
        }

        async fn enter(&self, op: &'static str) -> Result<(), ApiError> {
            if self.gated.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            match self.failures.lock().unwrap().get(op) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl TaskApi for FakeApi {
        async fn list(&self) -> Result<Vec<TaskItem>, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.enter("list").await?;
            Ok(self.tasks.lock().unwrap().clone())
        }

        async fn create(&self, task: &NewTaskPayload) -> Result<TaskItem, ApiError> {
            self.enter("create").await?;
            let created = TaskItem {
                id: format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                title: task.title.clone(),
                description: task.description.clone(),
                completed: false,
                due_date: task.due_date.clone(),
            };
            self.tasks.lock().unwrap().insert(0, created.clone());
            Ok(created)
        }

        async fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskItem, ApiError> {
            self.enter("update").await?;
            let mut tasks = self.tasks.lock().unwrap();
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(ApiError::Status(404))?;
            if let Some(title) = &patch.title {
                task.title = title.clone();
            }
            if let Some(description) = &patch.description {
                task.description = Some(description.clone());
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
            Ok(task.clone())
        }

        async fn delete(&self, id: &str) -> Result<(), ApiError> {
            self.enter("delete").await?;
            let mut tasks = self.tasks.lock().unwrap();
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            if tasks.len() == before {
                return Err(ApiError::Status(404));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNavigator(Mutex<Vec<String>>);

    impl Navigator for RecordingNavigator {
        fn redirect(&self, path: &str) {
            self.0.lock().unwrap().push(path.to_string());
        }
    }

    impl RecordingNavigator {
        fn visited(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn item(id: &str, title: &str, completed: bool) -> TaskItem {
        TaskItem {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            completed,
            due_date: None,
        }
    }

    fn store_with(
        api: Arc<FakeApi>,
    ) -> (TaskStore<Arc<FakeApi>>, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        (TaskStore::new(api, navigator.clone()), navigator)
    }

    #[actix_rt::test]
    async fn test_fetch_all_replaces_local_list() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false), item("b", "Second", true)]);
        let (store, _) = store_with(api);

        let tasks = store.fetch_all().await.unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(store.tasks(), tasks);
        assert!(!store.is_loading());
    }

    #[actix_rt::test]
    async fn test_fetch_all_failure_keeps_list_and_reports() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false)]);
        let (store, _) = store_with(api.clone());
        store.fetch_all().await.unwrap();

        api.fail("list", ApiError::Status(500));
        let error = store.fetch_all().await.unwrap_err();

        assert_eq!(error.to_string(), "Failed to fetch tasks");
        assert_eq!(store.tasks().len(), 1);
        assert!(!store.is_loading());
    }

    #[actix_rt::test]
    async fn test_add_replaces_placeholder_with_server_record() {
        let (store, _) = store_with(Arc::new(FakeApi::default()));

        let created = store.add("Buy milk", None, Some("")).await.unwrap();

        assert_eq!(created.id, "srv-0");
        assert_eq!(created.due_date, None);
        assert_eq!(store.tasks(), vec![created]);
        assert!(!store.is_adding());
    }

    #[actix_rt::test]
    async fn test_add_shows_placeholder_before_server_answers() {
        let api = Arc::new(FakeApi::default());
        api.hold_requests();
        let (store, _) = store_with(api.clone());

        let observe = async {
            let mut seen = Vec::new();
            for _ in 0..100 {
                seen = store.tasks();
                if !seen.is_empty() {
                    break;
                }
                tokio::task::yield_now().await;
            }
            let adding = store.is_adding();
            api.release();
            (seen, adding)
        };
        let (result, (seen, adding)) = tokio::join!(store.add("X", None, None), observe);

        assert_eq!(seen.len(), 1);
        assert!(seen[0].id.starts_with("tmp-"));
        assert_eq!(seen[0].title, "X");
        assert!(adding);
        assert_eq!(store.tasks(), vec![result.unwrap()]);
    }

    #[actix_rt::test]
    async fn test_add_failure_removes_placeholder() {
        let api = Arc::new(FakeApi::default());
        api.fail("create", ApiError::Status(500));
        let (store, _) = store_with(api);

        let error = store.add("X", None, None).await.unwrap_err();

        assert_eq!(error, ActionError::Failed("Failed to add task"));
        assert!(store.tasks().iter().all(|t| t.title != "X"));
        assert!(!store.is_adding());
    }

    #[actix_rt::test]
    async fn test_add_unauthorized_removes_placeholder_and_redirects() {
        let api = Arc::new(FakeApi::default());
        api.fail("create", ApiError::Unauthorized);
        let (store, navigator) = store_with(api);

        let error = store.add("X", None, None).await.unwrap_err();

        assert_eq!(error, ActionError::Unauthorized);
        assert!(store.tasks().is_empty());
        assert_eq!(navigator.visited(), vec![LOGIN_PATH.to_string()]);
    }

    #[actix_rt::test]
    async fn test_network_failure_reports_network_error() {
        let api = Arc::new(FakeApi::default());
        api.fail("create", ApiError::Network("connection refused".into()));
        let (store, _) = store_with(api);

        let error = store.add("X", None, None).await.unwrap_err();

        assert_eq!(error.to_string(), "Network error");
    }

    #[actix_rt::test]
    async fn test_toggle_applies_server_answer() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false)]);
        let (store, _) = store_with(api);
        store.fetch_all().await.unwrap();

        let task = store.toggle("a", true).await.unwrap();

        assert!(task.completed);
        assert!(store.tasks()[0].completed);
        assert!(!store.is_busy("a"));
    }

    #[actix_rt::test]
    async fn test_toggle_failure_refetches_server_state() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false)]);
        let (store, _) = store_with(api.clone());
        store.fetch_all().await.unwrap();
        api.fail("update", ApiError::Status(500));

        let error = store.toggle("a", true).await.unwrap_err();

        assert_eq!(error.to_string(), "Failed to toggle task");
        assert!(!store.tasks()[0].completed);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);
    }

    #[actix_rt::test]
    async fn test_toggle_unauthorized_redirects_without_refetch() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false)]);
        let (store, navigator) = store_with(api.clone());
        store.fetch_all().await.unwrap();
        api.fail("update", ApiError::Unauthorized);

        let error = store.toggle("a", true).await.unwrap_err();

        assert_eq!(error, ActionError::Unauthorized);
        assert_eq!(navigator.visited(), vec![LOGIN_PATH.to_string()]);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[actix_rt::test]
    async fn test_remove_failure_restores_task_from_server() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false), item("b", "Second", false)]);
        let (store, _) = store_with(api.clone());
        store.fetch_all().await.unwrap();
        api.fail("delete", ApiError::Status(500));

        let error = store.remove("a").await.unwrap_err();

        assert_eq!(error.to_string(), "Failed to delete task");
        let ids: Vec<String> = store.tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        assert!(!store.is_busy("a"));
    }

    #[actix_rt::test]
    async fn test_remove_drops_task() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false), item("b", "Second", false)]);
        let (store, _) = store_with(api);
        store.fetch_all().await.unwrap();

        store.remove("a").await.unwrap();

        let ids: Vec<String> = store.tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["b".to_string()]);
    }

    #[actix_rt::test]
    async fn test_update_changes_nothing_until_server_accepts() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false)]);
        let (store, _) = store_with(api.clone());
        store.fetch_all().await.unwrap();
        api.fail("update", ApiError::Status(400));

        let patch = TaskPatch {
            title: Some("Renamed".into()),
            ..TaskPatch::default()
        };
        let error = store.update("a", patch).await.unwrap_err();

        assert_eq!(error.to_string(), "Failed to update task");
        assert_eq!(store.tasks()[0].title, "First");
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[actix_rt::test]
    async fn test_update_applies_server_answer() {
        let api = FakeApi::with_tasks(vec![item("a", "First", false)]);
        let (store, _) = store_with(api);
        store.fetch_all().await.unwrap();

        let patch = TaskPatch {
            title: Some("Renamed".into()),
            description: Some("details".into()),
            ..TaskPatch::default()
        };
        store.update("a", patch).await.unwrap();

        let task = &store.tasks()[0];
        assert_eq!(task.title, "Renamed");
        assert_eq!(task.description.as_deref(), Some("details"));
    }

    #[actix_rt::test]
    async fn test_filter_selects_visible_tasks() {
        let api = FakeApi::with_tasks(vec![item("a", "Open", false), item("b", "Done", true)]);
        let (store, _) = store_with(api);
        store.fetch_all().await.unwrap();

        assert_eq!(store.filter(), Filter::All);
        assert_eq!(store.visible_tasks().len(), 2);

        store.set_filter(Filter::Pending);
        assert_eq!(store.visible_tasks(), vec![item("a", "Open", false)]);

        store.set_filter(Filter::Completed);
        assert_eq!(store.visible_tasks(), vec![item("b", "Done", true)]);
    }
}
