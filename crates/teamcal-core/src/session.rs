use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datemath;
use crate::event::{Event, EventFields, SlotFields};
use crate::filter::OwnerFilter;
use crate::storage::KeyValueStore;
use crate::store::EventStore;
use crate::team::Team;
use crate::validate::{self, Problem};
use crate::view::{self, CalendarView, DEFAULT_PREVIEW_LIMIT, ViewParams};

pub const CONFIRM_DELETE_ONE: &str = "Delete this event?";
pub const CONFIRM_DELETE_ALL: &str = "Delete all events?";

/// Source of the current local time.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Yes/no gate in front of destructive actions.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

/// Answers yes to every prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, message: &str) -> bool {
        debug!(message, "confirmation assumed");
        true
    }
}

/// Paints a calendar view model.
pub trait Renderer {
    fn render_grid(&mut self, view: &CalendarView) -> anyhow::Result<()>;

    fn render_day_panel(&mut self, view: &CalendarView) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Created(Event),
    Rejected(Vec<Problem>),
}

/// One calendar surface: the view state plus the store it shows. Every
/// intent that changes what is visible ends by re-rendering.
pub struct CalendarSession<S: KeyValueStore> {
    store: EventStore<S>,
    team: Team,
    preview_limit: usize,
    clock: Box<dyn Clock>,
    confirm: Box<dyn Confirm>,
    renderer: Box<dyn Renderer>,
    view_year: i32,
    view_month: u32,
    selected_date: NaiveDate,
    owner_filter: OwnerFilter,
}

impl<S: KeyValueStore> CalendarSession<S> {
    pub fn new(
        store: EventStore<S>,
        team: Team,
        clock: Box<dyn Clock>,
        confirm: Box<dyn Confirm>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        let today = clock.today();
        Self {
            store,
            team,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            clock,
            confirm,
            renderer,
            view_year: today.year(),
            view_month: today.month(),
            selected_date: today,
            owner_filter: OwnerFilter::All,
        }
    }

    #[must_use]
    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    pub fn view(&self) -> anyhow::Result<CalendarView> {
        let params = ViewParams {
            view_year: self.view_year,
            view_month: self.view_month,
            selected_date: self.selected_date,
            owner_filter: &self.owner_filter,
            today: self.clock.today(),
            preview_limit: self.preview_limit,
        };
        Ok(view::build_view(self.store.events(), &params, &self.team)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn refresh(&mut self) -> anyhow::Result<()> {
        let view = self.view()?;
        self.renderer.render_grid(&view)?;
        self.renderer.render_day_panel(&view)
    }

    #[tracing::instrument(skip(self))]
    pub fn navigate_month(&mut self, delta: i32) -> anyhow::Result<()> {
        (self.view_year, self.view_month) =
            datemath::shift_month(self.view_year, self.view_month, delta)?;
        debug!(year = self.view_year, month = self.view_month, "navigated month");
        self.refresh()
    }

    #[tracing::instrument(skip(self))]
    pub fn go_today(&mut self) -> anyhow::Result<()> {
        let today = self.clock.today();
        self.view_year = today.year();
        self.view_month = today.month();
        self.selected_date = today;
        self.refresh()
    }

    /// Selects `date` without moving the visible month, so picking an
    /// adjacent-month cell keeps the grid in place.
    #[tracing::instrument(skip(self))]
    pub fn select_date(&mut self, date: NaiveDate) -> anyhow::Result<()> {
        self.selected_date = date;
        self.refresh()
    }

    /// Restores previously saved view state without rendering, e.g. when a
    /// surface is rebuilt from the command line.
    pub fn restore(
        &mut self,
        view_year: i32,
        view_month: u32,
        selected_date: NaiveDate,
        owner_filter: OwnerFilter,
    ) -> anyhow::Result<()> {
        datemath::first_of_month(view_year, view_month)?;
        self.view_year = view_year;
        self.view_month = view_month;
        self.selected_date = selected_date;
        self.owner_filter = owner_filter;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn set_owner_filter(&mut self, filter: OwnerFilter) -> anyhow::Result<()> {
        self.owner_filter = filter;
        self.refresh()
    }

    #[tracing::instrument(skip(self, fields))]
    pub fn submit(&mut self, fields: &EventFields) -> anyhow::Result<SubmitOutcome> {
        let problems = validate::validate_fields(fields);
        if !problems.is_empty() {
            debug!(problems = problems.len(), "submission rejected");
            return Ok(SubmitOutcome::Rejected(problems));
        }
        let event = Event::from_fields(fields, self.now_utc())?;
        self.accept(event)
    }

    #[tracing::instrument(skip(self, fields))]
    pub fn submit_slot(&mut self, fields: &SlotFields) -> anyhow::Result<SubmitOutcome> {
        let problems = validate::validate_slot_fields(fields, &self.team);
        if !problems.is_empty() {
            debug!(problems = problems.len(), "slot submission rejected");
            return Ok(SubmitOutcome::Rejected(problems));
        }
        let event = Event::from_slot_fields(fields, self.now_utc())?;
        self.accept(event)
    }

    /// Deletes one event after an affirmative confirmation. Returns whether
    /// the event existed and was removed.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete_event(&mut self, id: Uuid) -> anyhow::Result<bool> {
        if !self.confirm.confirm(CONFIRM_DELETE_ONE) {
            info!("delete cancelled");
            return Ok(false);
        }
        let removed = self.store.remove(id)?;
        self.refresh()?;
        Ok(removed)
    }

    /// Deletes every event after an affirmative confirmation.
    #[tracing::instrument(skip(self))]
    pub fn clear_all(&mut self) -> anyhow::Result<bool> {
        if !self.confirm.confirm(CONFIRM_DELETE_ALL) {
            info!("clear cancelled");
            return Ok(false);
        }
        self.store.clear()?;
        self.refresh()?;
        Ok(true)
    }

    pub fn store(&self) -> &EventStore<S> {
        &self.store
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    pub fn view_month(&self) -> (i32, u32) {
        (self.view_year, self.view_month)
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn owner_filter(&self) -> &OwnerFilter {
        &self.owner_filter
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn accept(&mut self, event: Event) -> anyhow::Result<SubmitOutcome> {
        self.store.add(event.clone())?;
        self.selected_date = event.date;
        self.view_year = event.date.year();
        self.view_month = event.date.month();
        info!(id = %event.id, date = %event.date, "event created");
        // Already persisted; a render failure does not undo the write.
        if let Err(err) = self.refresh() {
            warn!(error = %format!("{err:#}"), "render after create failed");
        }
        Ok(SubmitOutcome::Created(event))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

    use super::{
        CONFIRM_DELETE_ALL, CONFIRM_DELETE_ONE, CalendarSession, Clock, Confirm, Renderer,
        SubmitOutcome,
    };
    use crate::event::{EventFields, SlotFields};
    use crate::filter::OwnerFilter;
    use crate::storage::MemoryStorage;
    use crate::store::{DEFAULT_STORAGE_KEY, EventStore};
    use crate::team::Team;
    use crate::validate::{END_BEFORE_START, Field};
    use crate::view::CalendarView;

    struct FixedClock(DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    #[derive(Clone, Default)]
    struct ScriptedConfirm {
        answers: Rc<RefCell<VecDeque<bool>>>,
        asked: Rc<RefCell<Vec<String>>>,
    }

    impl Confirm for ScriptedConfirm {
        fn confirm(&mut self, message: &str) -> bool {
            self.asked.borrow_mut().push(message.to_string());
            self.answers.borrow_mut().pop_front().unwrap_or(false)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        views: Rc<RefCell<Vec<CalendarView>>>,
        panels: Rc<RefCell<usize>>,
    }

    impl Renderer for RecordingRenderer {
        fn render_grid(&mut self, view: &CalendarView) -> anyhow::Result<()> {
            self.views.borrow_mut().push(view.clone());
            Ok(())
        }

        fn render_day_panel(&mut self, _view: &CalendarView) -> anyhow::Result<()> {
            *self.panels.borrow_mut() += 1;
            Ok(())
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn fixed_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 12, 20, 9, 30, 0)
            .single()
            .expect("valid now")
    }

    fn session(
        confirm: ScriptedConfirm,
        renderer: RecordingRenderer,
    ) -> CalendarSession<MemoryStorage> {
        CalendarSession::new(
            EventStore::open(MemoryStorage::new(), DEFAULT_STORAGE_KEY),
            Team::default(),
            Box::new(FixedClock(fixed_now())),
            Box::new(confirm),
            Box::new(renderer),
        )
    }

    fn fields(title: &str, owner: &str, date: &str, start: &str, end: &str) -> EventFields {
        EventFields {
            title: title.to_string(),
            owner: owner.to_string(),
            date: date.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            ..EventFields::default()
        }
    }

    fn created(outcome: SubmitOutcome) -> crate::event::Event {
        match outcome {
            SubmitOutcome::Created(event) => event,
            SubmitOutcome::Rejected(problems) => panic!("unexpected rejection: {problems:?}"),
        }
    }

    #[test]
    fn starts_on_today() {
        let cal = session(ScriptedConfirm::default(), RecordingRenderer::default());
        assert_eq!(cal.view_month(), (2024, 12));
        assert_eq!(cal.selected_date(), ymd(2024, 12, 20));
    }

    #[test]
    fn navigation_wraps_year_and_keeps_selection() {
        let renderer = RecordingRenderer::default();
        let mut cal = session(ScriptedConfirm::default(), renderer.clone());

        cal.navigate_month(1).expect("next");
        assert_eq!(cal.view_month(), (2025, 1));
        cal.navigate_month(-2).expect("prev");
        assert_eq!(cal.view_month(), (2024, 11));
        assert_eq!(cal.selected_date(), ymd(2024, 12, 20));

        let views = renderer.views.borrow();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].month_label, "January 2025");
        assert_eq!(*renderer.panels.borrow(), 2);
    }

    #[test]
    fn navigation_past_calendar_range_fails_without_moving() {
        let renderer = RecordingRenderer::default();
        let mut cal = session(ScriptedConfirm::default(), renderer.clone());

        assert!(cal.navigate_month(i32::MAX).is_err());
        assert!(cal.navigate_month(i32::MIN).is_err());
        assert_eq!(cal.view_month(), (2024, 12));
        assert!(renderer.views.borrow().is_empty());
    }

    struct BrokenRenderer;

    impl Renderer for BrokenRenderer {
        fn render_grid(&mut self, _view: &CalendarView) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("broken pipe"))
        }

        fn render_day_panel(&mut self, _view: &CalendarView) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("broken pipe"))
        }
    }

    #[test]
    fn created_event_is_reported_even_when_rendering_fails() {
        let mut cal = CalendarSession::new(
            EventStore::open(MemoryStorage::new(), DEFAULT_STORAGE_KEY),
            Team::default(),
            Box::new(FixedClock(fixed_now())),
            Box::new(ScriptedConfirm::default()),
            Box::new(BrokenRenderer),
        );

        let outcome = cal
            .submit(&fields("Retro", "Sofia", "2024-12-23", "15:00", "16:00"))
            .expect("submit succeeds despite render failure");
        assert!(matches!(outcome, SubmitOutcome::Created(_)));
        assert_eq!(cal.store().len(), 1);
        assert_eq!(cal.selected_date(), ymd(2024, 12, 23));
    }

    #[test]
    fn selecting_adjacent_month_day_keeps_view() {
        let mut cal = session(ScriptedConfirm::default(), RecordingRenderer::default());
        cal.navigate_month(-1).expect("prev");
        cal.select_date(ymd(2024, 12, 2)).expect("select");
        assert_eq!(cal.view_month(), (2024, 11));
        assert_eq!(cal.selected_date(), ymd(2024, 12, 2));

        cal.go_today().expect("today");
        assert_eq!(cal.view_month(), (2024, 12));
        assert_eq!(cal.selected_date(), ymd(2024, 12, 20));
    }

    #[test]
    fn restore_sets_state_without_rendering() {
        let renderer = RecordingRenderer::default();
        let mut cal = session(ScriptedConfirm::default(), renderer.clone());
        cal.restore(2024, 2, ymd(2024, 3, 1), OwnerFilter::member("anna"))
            .expect("restore");
        assert_eq!(cal.view_month(), (2024, 2));
        assert_eq!(cal.selected_date(), ymd(2024, 3, 1));
        assert_eq!(cal.owner_filter(), &OwnerFilter::member("anna"));
        assert!(renderer.views.borrow().is_empty());

        assert!(cal.restore(2024, 13, ymd(2024, 3, 1), OwnerFilter::All).is_err());
        assert_eq!(cal.view_month(), (2024, 2));
    }

    #[test]
    fn submit_selects_new_event_day_and_month() {
        let mut cal = session(ScriptedConfirm::default(), RecordingRenderer::default());
        let event = created(
            cal.submit(&fields("Sprint planning", "Anna", "2024-03-01", "09:00", "10:00"))
                .expect("submit"),
        );

        assert_eq!(cal.selected_date(), ymd(2024, 3, 1));
        assert_eq!(cal.view_month(), (2024, 3));
        assert_eq!(cal.store().len(), 1);
        assert_eq!(event.created_at, fixed_now().with_timezone(&Utc));

        let view = cal.view().expect("view");
        assert_eq!(view.selected_day_events.len(), 1);
        assert_eq!(view.selected_day_events[0].id, event.id);
    }

    #[test]
    fn rejected_submit_leaves_store_unchanged() {
        let renderer = RecordingRenderer::default();
        let mut cal = session(ScriptedConfirm::default(), renderer.clone());
        let before = cal.store().len();

        let outcome = cal
            .submit(&fields("Sprint planning", "Anna", "2024-03-01", "10:00", "09:00"))
            .expect("submit");
        match outcome {
            SubmitOutcome::Rejected(problems) => {
                assert_eq!(problems.len(), 1);
                assert_eq!(problems[0].field, Field::End);
                assert_eq!(problems[0].message, END_BEFORE_START);
            }
            SubmitOutcome::Created(_) => panic!("reversed times must be rejected"),
        }
        assert_eq!(cal.store().len(), before);
        assert_eq!(cal.selected_date(), ymd(2024, 12, 20));
        assert!(renderer.views.borrow().is_empty());
    }

    #[test]
    fn slot_submit_uses_slot_times() {
        let mut cal = session(ScriptedConfirm::default(), RecordingRenderer::default());
        let event = created(
            cal.submit_slot(&SlotFields {
                title: "Standup".to_string(),
                owner: "noah".to_string(),
                date: "2024-12-23".to_string(),
                slot: "10:00-11:00".to_string(),
                ..SlotFields::default()
            })
            .expect("submit"),
        );
        assert_eq!((event.start.as_str(), event.end.as_str()), ("10:00", "11:00"));

        let outcome = cal
            .submit_slot(&SlotFields {
                title: "Standup".to_string(),
                owner: "noah".to_string(),
                date: "2024-12-23".to_string(),
                slot: "Afternoon".to_string(),
                ..SlotFields::default()
            })
            .expect("submit");
        assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
        assert_eq!(cal.store().len(), 1);
    }

    #[test]
    fn delete_requires_confirmation() {
        let confirm = ScriptedConfirm::default();
        confirm.answers.borrow_mut().extend([false, true]);
        let mut cal = session(confirm.clone(), RecordingRenderer::default());
        let event = created(
            cal.submit(&fields("Demo", "Anna", "2024-12-20", "14:00", "15:00"))
                .expect("submit"),
        );

        assert!(!cal.delete_event(event.id).expect("declined delete"));
        assert_eq!(cal.store().len(), 1);

        assert!(cal.delete_event(event.id).expect("confirmed delete"));
        assert!(cal.store().is_empty());
        assert_eq!(
            *confirm.asked.borrow(),
            vec![CONFIRM_DELETE_ONE.to_string(), CONFIRM_DELETE_ONE.to_string()]
        );
    }

    #[test]
    fn clear_all_requires_confirmation() {
        let confirm = ScriptedConfirm::default();
        confirm.answers.borrow_mut().extend([false, true]);
        let mut cal = session(confirm.clone(), RecordingRenderer::default());
        cal.submit(&fields("A", "Anna", "2024-12-20", "09:00", "10:00"))
            .expect("submit");
        cal.submit(&fields("B", "Liam", "2024-12-21", "09:00", "10:00"))
            .expect("submit");

        assert!(!cal.clear_all().expect("declined clear"));
        assert_eq!(cal.store().len(), 2);
        assert!(cal.clear_all().expect("confirmed clear"));
        assert!(cal.store().is_empty());
        assert_eq!(confirm.asked.borrow()[0], CONFIRM_DELETE_ALL);
    }

    #[test]
    fn owner_filter_changes_view_only() {
        let renderer = RecordingRenderer::default();
        let mut cal = session(ScriptedConfirm::default(), renderer.clone());
        cal.submit(&fields("Planning", "Anna", "2024-12-20", "09:00", "10:00"))
            .expect("submit");
        cal.submit(&fields("Pairing", "Liam", "2024-12-20", "11:00", "12:00"))
            .expect("submit");

        cal.set_owner_filter(OwnerFilter::contains("ann")).expect("filter");
        assert_eq!(cal.store().len(), 2);

        let views = renderer.views.borrow();
        let last = views.last().expect("rendered");
        assert_eq!(last.selected_day_events.len(), 1);
        let cell = last
            .grid
            .iter()
            .find(|cell| cell.date == ymd(2024, 12, 20))
            .expect("cell");
        assert_eq!(cell.event_count, 1);
    }
}
