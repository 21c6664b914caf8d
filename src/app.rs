use std::time::Duration;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use agenti_core::{
    Catalog, Conversation, GeneratedListingDraft, GenerationClient, Listing,
    ListingDraft, Sector, SectorFilter, Session, FALLBACK_REPLY,
};

/// Suggested openers offered on the demo tab
pub const QUICK_PROMPTS: [&str; 3] = ["Capabilities?", "Pricing ROI?", "Setup time?"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Browse,
    Detail,
    Create,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailTab {
    #[default]
    Overview,
    Demo,
    Reviews,
}

impl DetailTab {
    pub fn all() -> [DetailTab; 3] {
        [DetailTab::Overview, DetailTab::Demo, DetailTab::Reviews]
    }

    pub fn title(&self) -> &'static str {
        match self {
            DetailTab::Overview => "Overview",
            DetailTab::Demo => "Live Demo",
            DetailTab::Reviews => "Reviews",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            DetailTab::Overview => DetailTab::Demo,
            DetailTab::Demo => DetailTab::Reviews,
            DetailTab::Reviews => DetailTab::Overview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardTab {
    #[default]
    Overview,
    Activity,
    Billing,
}

impl DashboardTab {
    pub fn all() -> [DashboardTab; 3] {
        [DashboardTab::Overview, DashboardTab::Activity, DashboardTab::Billing]
    }

    pub fn title(&self) -> &'static str {
        match self {
            DashboardTab::Overview => "Overview",
            DashboardTab::Activity => "Activity",
            DashboardTab::Billing => "Billing",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            DashboardTab::Overview => DashboardTab::Activity,
            DashboardTab::Activity => DashboardTab::Billing,
            DashboardTab::Billing => DashboardTab::Overview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plan {
    #[default]
    Monthly,
    Yearly,
}

impl Plan {
    pub fn toggled(&self) -> Self {
        match self {
            Plan::Monthly => Plan::Yearly,
            Plan::Yearly => Plan::Monthly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStatus {
    Idle,
    Purchasing,
    Success,
    Owned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardStep {
    #[default]
    Idea,
    Details,
    Review,
}

impl WizardStep {
    pub fn number(&self) -> usize {
        match self {
            WizardStep::Idea => 1,
            WizardStep::Details => 2,
            WizardStep::Review => 3,
        }
    }
}

/// Editable rows on the wizard's details step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Tagline,
    Description,
    Sector,
    MonthlyPrice,
    YearlyPrice,
    Capability(usize),
}

impl DraftField {
    pub fn label(&self) -> String {
        match self {
            DraftField::Name => "Name".to_string(),
            DraftField::Tagline => "Tagline".to_string(),
            DraftField::Description => "Description".to_string(),
            DraftField::Sector => "Sector".to_string(),
            DraftField::MonthlyPrice => "Monthly $".to_string(),
            DraftField::YearlyPrice => "Yearly $".to_string(),
            DraftField::Capability(i) => format!("Capability {}", i + 1),
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub status_message: Option<String>,

    // Browse state
    pub search_input: String,
    pub sector_filter_idx: usize,
    pub browse_state: ListState,
    pub visible_ids: Vec<String>,

    // Detail state
    pub detail_id: Option<String>,
    pub detail_tab: DetailTab,
    pub conversation: Conversation,
    pub chat_input: String,
    pub chat_cursor: usize,
    pub chat_task: Option<JoinHandle<String>>,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub quick_prompt_idx: usize,
    pub plan: Plan,
    pub purchase_task: Option<(String, JoinHandle<()>)>,
    pub just_purchased: Option<String>,

    // Create wizard state
    pub wizard_step: WizardStep,
    pub idea_input: String,
    pub draft: ListingDraft,
    pub draft_field_idx: usize,
    pub monthly_input: String,
    pub yearly_input: String,
    pub draft_task: Option<JoinHandle<Option<GeneratedListingDraft>>>,
    pub wizard_notice: Option<String>,

    // Dashboard state
    pub dashboard_tab: DashboardTab,
    pub owned_state: ListState,

    // Animation state
    pub animation_frame: u8,

    // Panel areas for mouse hit-testing (updated during render)
    pub list_area: Option<Rect>,
    pub chat_area: Option<Rect>,

    // Data
    pub catalog: Catalog,
    pub session: Session,
    pub client: GenerationClient,
    pub purchase_delay: Duration,
}

impl App {
    pub fn new(catalog: Catalog, client: GenerationClient, purchase_delay: Duration) -> Self {
        let draft = ListingDraft::new();
        let monthly_input = format_price(draft.monthly_price);
        let yearly_input = format_price(draft.yearly_price);

        let mut app = Self {
            should_quit: false,
            screen: Screen::Browse,
            input_mode: InputMode::Normal,
            status_message: None,

            search_input: String::new(),
            sector_filter_idx: 0,
            browse_state: ListState::default(),
            visible_ids: Vec::new(),

            detail_id: None,
            detail_tab: DetailTab::default(),
            conversation: Conversation::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_task: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            quick_prompt_idx: 0,
            plan: Plan::default(),
            purchase_task: None,
            just_purchased: None,

            wizard_step: WizardStep::default(),
            idea_input: String::new(),
            draft,
            draft_field_idx: 0,
            monthly_input,
            yearly_input,
            draft_task: None,
            wizard_notice: None,

            dashboard_tab: DashboardTab::default(),
            owned_state: ListState::default(),

            animation_frame: 0,

            list_area: None,
            chat_area: None,

            catalog,
            session: Session::new(),
            client,
            purchase_delay,
        };
        app.refresh_browse();
        app
    }

    // Browse

    pub fn sector_filter(&self) -> SectorFilter {
        SectorFilter::all()
            .get(self.sector_filter_idx)
            .copied()
            .unwrap_or_default()
    }

    pub fn next_sector_filter(&mut self) {
        self.sector_filter_idx = (self.sector_filter_idx + 1) % SectorFilter::all().len();
        self.refresh_browse();
    }

    pub fn prev_sector_filter(&mut self) {
        let len = SectorFilter::all().len();
        self.sector_filter_idx = (self.sector_filter_idx + len - 1) % len;
        self.refresh_browse();
    }

    /// Recompute the visible listings after a search or filter change
    pub fn refresh_browse(&mut self) {
        self.visible_ids = self
            .catalog
            .filter(&self.sector_filter(), &self.search_input)
            .into_iter()
            .map(|listing| listing.id.clone())
            .collect();

        if self.visible_ids.is_empty() {
            self.browse_state.select(None);
        } else {
            let i = self.browse_state.selected().unwrap_or(0);
            self.browse_state.select(Some(i.min(self.visible_ids.len() - 1)));
        }
    }

    pub fn visible_listings(&self) -> Vec<&Listing> {
        self.visible_ids
            .iter()
            .filter_map(|id| self.catalog.get(id).ok())
            .collect()
    }

    pub fn browse_nav_down(&mut self) {
        let len = self.visible_ids.len();
        if len > 0 {
            let i = self.browse_state.selected().unwrap_or(0);
            self.browse_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn browse_nav_up(&mut self) {
        let i = self.browse_state.selected().unwrap_or(0);
        self.browse_state.select(Some(i.saturating_sub(1)));
    }

    pub fn selected_browse_id(&self) -> Option<String> {
        self.browse_state
            .selected()
            .and_then(|i| self.visible_ids.get(i))
            .cloned()
    }

    // Navigation

    /// Open a listing's detail screen. Unknown ids render the not-found view.
    pub fn open_listing(&mut self, id: &str) {
        self.leave_detail();
        tracing::debug!(listing = id, "open listing");
        self.detail_id = Some(id.to_string());
        self.detail_tab = DetailTab::Overview;
        self.plan = Plan::Monthly;
        self.screen = Screen::Detail;
        self.input_mode = InputMode::Normal;
    }

    pub fn go_to(&mut self, screen: Screen) {
        if self.screen == Screen::Detail && screen != Screen::Detail {
            self.leave_detail();
        }
        if screen == Screen::Dashboard {
            let owned = self.owned_listings().len();
            if owned > 0 && self.owned_state.selected().is_none() {
                self.owned_state.select(Some(0));
            }
        }
        self.screen = screen;
        self.input_mode = InputMode::Normal;
    }

    /// Drop the per-listing demo state. An outstanding reply is detached
    /// and its result discarded.
    fn leave_detail(&mut self) {
        self.conversation = Conversation::new();
        self.chat_task = None;
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.chat_scroll = 0;
        self.quick_prompt_idx = 0;
        self.just_purchased = None;
    }

    pub fn current_listing(&self) -> Option<&Listing> {
        self.detail_id
            .as_deref()
            .and_then(|id| self.catalog.get(id).ok())
    }

    // Detail: demo chat

    pub fn chat_pending(&self) -> bool {
        self.chat_task.is_some()
    }

    /// Submit the chat input. Ignored while a reply is outstanding or when
    /// the input is blank.
    pub fn send_chat(&mut self) {
        if self.chat_pending() || self.chat_input.trim().is_empty() {
            return;
        }
        let Some(listing) = self.current_listing().cloned() else {
            return;
        };

        let text = std::mem::take(&mut self.chat_input);
        self.chat_cursor = 0;
        let prior = self.conversation.open_turn(&text);
        self.scroll_chat_to_bottom();

        let client = self.client.clone();
        self.chat_task = Some(tokio::spawn(async move {
            client
                .converse(&listing.name, &listing.persona_summary(), &prior, &text)
                .await
        }));
    }

    pub fn fill_chat_input(&mut self, text: &str) {
        self.chat_input = text.to_string();
        self.chat_cursor = self.chat_input.chars().count();
    }

    pub fn fill_next_quick_prompt(&mut self) {
        let prompt = QUICK_PROMPTS[self.quick_prompt_idx % QUICK_PROMPTS.len()];
        self.quick_prompt_idx = (self.quick_prompt_idx + 1) % QUICK_PROMPTS.len();
        self.fill_chat_input(prompt);
    }

    pub fn fill_seed_prompt(&mut self) {
        if let Some(seed) = self.current_listing().and_then(|l| l.demo_prompt.clone()) {
            self.fill_chat_input(&seed);
        }
    }

    /// Scroll chat so the newest message and the pending indicator are visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.conversation.messages() {
            total_lines += 1; // Role line
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                total_lines += if char_count == 0 {
                    1
                } else {
                    ((char_count / wrap_width) + 1) as u16
                };
            }
            total_lines += 1;
        }
        if self.chat_pending() {
            total_lines += 2;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    // Detail: checkout

    pub fn purchase_status(&self) -> PurchaseStatus {
        let Some(id) = self.detail_id.as_deref() else {
            return PurchaseStatus::Idle;
        };
        if self.purchase_task.as_ref().is_some_and(|(pending, _)| pending == id) {
            PurchaseStatus::Purchasing
        } else if self.just_purchased.as_deref() == Some(id) {
            PurchaseStatus::Success
        } else if self.session.is_owned(id) {
            PurchaseStatus::Owned
        } else {
            PurchaseStatus::Idle
        }
    }

    /// Start the simulated checkout for the open listing
    pub fn start_purchase(&mut self) {
        if self.purchase_task.is_some() || self.purchase_status() != PurchaseStatus::Idle {
            return;
        }
        let Some(id) = self.current_listing().map(|l| l.id.clone()) else {
            return;
        };

        tracing::info!(listing = %id, plan = ?self.plan, "checkout started");
        let delay = self.purchase_delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
        });
        self.purchase_task = Some((id, task));
    }

    // Create wizard

    pub fn draft_fields(&self) -> Vec<DraftField> {
        let mut fields = vec![
            DraftField::Name,
            DraftField::Tagline,
            DraftField::Description,
            DraftField::Sector,
            DraftField::MonthlyPrice,
            DraftField::YearlyPrice,
        ];
        fields.extend((0..self.draft.capabilities.len()).map(DraftField::Capability));
        fields
    }

    pub fn selected_draft_field(&self) -> DraftField {
        let fields = self.draft_fields();
        fields
            .get(self.draft_field_idx)
            .copied()
            .unwrap_or(DraftField::Name)
    }

    pub fn draft_field_down(&mut self) {
        let len = self.draft_fields().len();
        self.draft_field_idx = (self.draft_field_idx + 1).min(len - 1);
    }

    pub fn draft_field_up(&mut self) {
        self.draft_field_idx = self.draft_field_idx.saturating_sub(1);
    }

    pub fn draft_field_value(&self, field: DraftField) -> String {
        match field {
            DraftField::Name => self.draft.name.clone(),
            DraftField::Tagline => self.draft.tagline.clone(),
            DraftField::Description => self.draft.description.clone(),
            DraftField::Sector => self.draft.sector.label().to_string(),
            DraftField::MonthlyPrice => self.monthly_input.clone(),
            DraftField::YearlyPrice => self.yearly_input.clone(),
            DraftField::Capability(i) => self.draft.capabilities.get(i).cloned().unwrap_or_default(),
        }
    }

    /// Text buffer behind the selected field, if it is free text
    fn draft_text_mut(&mut self) -> Option<&mut String> {
        match self.selected_draft_field() {
            DraftField::Name => Some(&mut self.draft.name),
            DraftField::Tagline => Some(&mut self.draft.tagline),
            DraftField::Description => Some(&mut self.draft.description),
            DraftField::Sector => None,
            DraftField::MonthlyPrice => Some(&mut self.monthly_input),
            DraftField::YearlyPrice => Some(&mut self.yearly_input),
            DraftField::Capability(i) => self.draft.capabilities.get_mut(i),
        }
    }

    pub fn draft_field_push(&mut self, c: char) {
        let field = self.selected_draft_field();
        let is_price = matches!(field, DraftField::MonthlyPrice | DraftField::YearlyPrice);
        if is_price && !(c.is_ascii_digit() || c == '.') {
            return;
        }
        if let Some(text) = self.draft_text_mut() {
            text.push(c);
        }
        self.sync_prices();
    }

    pub fn draft_field_pop(&mut self) {
        if let Some(text) = self.draft_text_mut() {
            text.pop();
        }
        self.sync_prices();
    }

    pub fn cycle_draft_sector(&mut self, forward: bool) {
        self.draft.sector = if forward {
            self.draft.sector.next()
        } else {
            self.draft.sector.prev()
        };
    }

    pub fn add_capability_slot(&mut self) {
        self.draft.capabilities.push(String::new());
        self.draft_field_idx = self.draft_fields().len() - 1;
    }

    fn sync_prices(&mut self) {
        self.draft.monthly_price = self.monthly_input.parse().unwrap_or(0.0);
        self.draft.yearly_price = self.yearly_input.parse().unwrap_or(0.0);
    }

    pub fn drafting(&self) -> bool {
        self.draft_task.is_some()
    }

    /// Ask the model for a draft of the current idea
    pub fn start_draft(&mut self) {
        if self.drafting() || self.idea_input.trim().is_empty() {
            return;
        }
        self.wizard_notice = None;
        let idea = self.idea_input.clone();
        let client = self.client.clone();
        self.draft_task = Some(tokio::spawn(async move { client.draft_listing(&idea).await }));
    }

    pub fn skip_to_manual_entry(&mut self) {
        self.wizard_step = WizardStep::Details;
        self.draft_field_idx = 0;
        self.wizard_notice = None;
    }

    pub fn publish_draft(&mut self) {
        match self.draft.validate() {
            Ok(()) => {
                tracing::info!(name = %self.draft.name, sector = %self.draft.sector, "listing submitted");
                self.status_message = Some(format!(
                    "\"{}\" submitted for review in {}.",
                    self.draft.name, self.draft.sector
                ));
                self.reset_wizard();
                self.go_to(Screen::Dashboard);
            }
            Err(e) => {
                self.wizard_notice = Some(format!("Cannot publish: {}", e));
            }
        }
    }

    pub fn reset_wizard(&mut self) {
        self.wizard_step = WizardStep::Idea;
        self.idea_input.clear();
        self.draft = ListingDraft::new();
        self.monthly_input = format_price(self.draft.monthly_price);
        self.yearly_input = format_price(self.draft.yearly_price);
        self.draft_field_idx = 0;
        self.wizard_notice = None;
    }

    // Dashboard

    pub fn owned_listings(&self) -> Vec<&Listing> {
        self.catalog.owned_by(&self.session.ledger)
    }

    pub fn selected_owned_id(&self) -> Option<String> {
        self.owned_state
            .selected()
            .and_then(|i| self.owned_listings().get(i).map(|l| l.id.clone()))
    }

    pub fn monthly_spend(&self) -> f64 {
        self.owned_listings().iter().map(|l| l.pricing.monthly).sum()
    }

    pub fn owned_nav_down(&mut self) {
        let len = self.owned_listings().len();
        if len > 0 {
            let i = self.owned_state.selected().unwrap_or(0);
            self.owned_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn owned_nav_up(&mut self) {
        let i = self.owned_state.selected().unwrap_or(0);
        self.owned_state.select(Some(i.saturating_sub(1)));
    }

    // Background work

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat_pending() || self.drafting() || self.purchase_task.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Collect finished background tasks and fold their results into state
    pub async fn poll_tasks(&mut self) {
        if self.chat_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.chat_task.take() {
                let reply = task.await.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "chat task failed");
                    FALLBACK_REPLY.to_string()
                });
                self.conversation.close_turn(reply);
                self.scroll_chat_to_bottom();
            }
        }

        if self.draft_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.draft_task.take() {
                let generated = task.await.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "draft task failed");
                    None
                });
                match generated {
                    Some(generated) => {
                        self.draft.merge_generated(generated);
                        self.wizard_step = WizardStep::Details;
                        self.draft_field_idx = 0;
                        self.wizard_notice = None;
                    }
                    None => {
                        self.wizard_notice = Some(
                            "Could not draft a profile right now. Try again or press m to fill it in manually."
                                .to_string(),
                        );
                    }
                }
            }
        }

        if self.purchase_task.as_ref().is_some_and(|(_, t)| t.is_finished()) {
            if let Some((id, task)) = self.purchase_task.take() {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "checkout task failed");
                }
                self.session.record_purchase(&id);
                if self.detail_id.as_deref() == Some(id.as_str()) {
                    self.just_purchased = Some(id);
                }
            }
        }
    }
}

pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{}", price as i64)
    } else {
        format!("{:.2}", price)
    }
}

pub fn sector_badge(sector: Sector) -> &'static str {
    match sector {
        Sector::Sales => "SAL",
        Sector::Marketing => "MKT",
        Sector::CustomerSupport => "SUP",
        Sector::DataAnalytics => "DAT",
        Sector::Automation => "AUT",
        Sector::Creative => "CRE",
        Sector::Legal => "LEG",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenti_core::{ChatCompletion, ChatRole, GenerationBackend};
    use std::sync::Arc;

    /// Echoes the last user turn back, upper-cased
    struct Echo;

    #[async_trait::async_trait]
    impl GenerationBackend for Echo {
        async fn complete_chat(&self, request: &ChatCompletion) -> anyhow::Result<String> {
            Ok(request
                .messages
                .last()
                .map(|m| m.content.to_uppercase())
                .unwrap_or_default())
        }

        async fn complete_json(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(r#"{"name":"MeetBot","tagline":"T","description":"D","capabilities":["a","b","c","d"]}"#.to_string())
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    /// Numbers its replies and keeps every request it was sent
    #[derive(Default)]
    struct Recorder {
        requests: std::sync::Mutex<Vec<ChatCompletion>>,
    }

    #[async_trait::async_trait]
    impl GenerationBackend for Recorder {
        async fn complete_chat(&self, request: &ChatCompletion) -> anyhow::Result<String> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            Ok(format!("reply {}", requests.len()))
        }

        async fn complete_json(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok("{}".to_string())
        }

        fn model(&self) -> &str {
            "recorder"
        }
    }

    fn test_app() -> App {
        let catalog = Catalog::builtin().unwrap();
        let client = GenerationClient::new(Arc::new(Echo));
        App::new(catalog, client, Duration::from_millis(10))
    }

    async fn settle(app: &mut App) {
        for _ in 0..100 {
            app.poll_tasks().await;
            if app.chat_task.is_none() && app.draft_task.is_none() && app.purchase_task.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_sector_filter_cycle() {
        let mut app = test_app();
        assert_eq!(app.visible_ids.len(), app.catalog.len());

        app.next_sector_filter();
        assert_eq!(app.sector_filter(), SectorFilter::Only(Sector::Sales));
        assert_eq!(app.visible_ids, vec!["1".to_string()]);

        app.prev_sector_filter();
        app.prev_sector_filter();
        assert_eq!(app.sector_filter(), SectorFilter::Only(Sector::Legal));
    }

    #[tokio::test]
    async fn test_chat_round_trip_and_reset_on_leave() {
        let mut app = test_app();
        app.open_listing("3");
        app.fill_chat_input("hello");
        app.send_chat();
        assert!(app.chat_pending());

        // A second send is ignored while the first is outstanding
        app.fill_chat_input("again");
        app.send_chat();

        settle(&mut app).await;
        let messages = app.conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].content, "HELLO");

        app.go_to(Screen::Browse);
        assert!(app.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_three_demo_turns_alternate_in_request_order() {
        let recorder = Arc::new(Recorder::default());
        let client = GenerationClient::new(recorder.clone());
        let mut app = App::new(Catalog::builtin().unwrap(), client, Duration::from_millis(10));
        app.open_listing("3");

        for text in ["one", "two", "three"] {
            app.fill_chat_input(text);
            app.send_chat();
            settle(&mut app).await;
        }

        let messages = app.conversation.messages();
        assert_eq!(messages.len(), 6);
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
            assert_eq!(message.role, expected);
        }
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "reply 1", "two", "reply 2", "three", "reply 3"]);

        // Each request carries the prior turns plus the new one
        let requests = recorder.requests.lock().unwrap();
        let lengths: Vec<usize> = requests.iter().map(|r| r.messages.len()).collect();
        assert_eq!(lengths, vec![1, 3, 5]);
        assert!(requests[2].system_instruction.contains("SupportWise"));
    }

    #[tokio::test]
    async fn test_dashboard_lists_purchases_in_order() {
        let mut app = test_app();
        for id in ["4", "1"] {
            app.open_listing(id);
            app.start_purchase();
            settle(&mut app).await;
        }

        let owned: Vec<&str> = app.owned_listings().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(owned, vec!["4", "1"]);

        app.go_to(Screen::Dashboard);
        assert_eq!(app.selected_owned_id().as_deref(), Some("4"));
        app.owned_nav_down();
        assert_eq!(app.selected_owned_id().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_blank_chat_not_sent() {
        let mut app = test_app();
        app.open_listing("3");
        app.fill_chat_input("   ");
        app.send_chat();
        assert!(!app.chat_pending());
        assert!(app.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_purchase_flow() {
        let mut app = test_app();
        app.open_listing("2");
        assert_eq!(app.purchase_status(), PurchaseStatus::Idle);

        app.start_purchase();
        assert_eq!(app.purchase_status(), PurchaseStatus::Purchasing);
        assert!(!app.session.is_owned("2"));

        settle(&mut app).await;
        assert_eq!(app.purchase_status(), PurchaseStatus::Success);
        assert!(app.session.is_owned("2"));

        app.open_listing("2");
        assert_eq!(app.purchase_status(), PurchaseStatus::Owned);
        app.start_purchase();
        assert!(app.purchase_task.is_none());
    }

    #[tokio::test]
    async fn test_unknown_listing_has_no_current() {
        let mut app = test_app();
        app.open_listing("nope");
        assert_eq!(app.screen, Screen::Detail);
        assert!(app.current_listing().is_none());
    }

    #[tokio::test]
    async fn test_wizard_draft_then_publish() {
        let mut app = test_app();
        app.go_to(Screen::Create);
        app.idea_input = "books meetings".to_string();
        app.start_draft();
        settle(&mut app).await;

        assert_eq!(app.wizard_step, WizardStep::Details);
        assert_eq!(app.draft.name, "MeetBot");
        assert_eq!(app.draft.capabilities.len(), 4);

        app.publish_draft();
        assert_eq!(app.screen, Screen::Dashboard);
        assert_eq!(app.wizard_step, WizardStep::Idea);
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn test_price_field_accepts_digits_only() {
        let mut app = test_app();
        app.skip_to_manual_entry();
        app.draft_field_idx = 4;
        assert_eq!(app.selected_draft_field(), DraftField::MonthlyPrice);

        app.draft_field_pop();
        app.draft_field_pop();
        app.draft_field_push('x');
        app.draft_field_push('4');
        app.draft_field_push('5');
        assert_eq!(app.monthly_input, "45");
        assert_eq!(app.draft.monthly_price, 45.0);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(29.0), "29");
        assert_eq!(format_price(9.5), "9.50");
    }
}
