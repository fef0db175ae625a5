//! Per-session application state.
//!
//! Everything the dashboard mutates while a user clicks around lives in one
//! `AppState` value owned by the caller. Nothing here is global; dropping
//! the state is the same as a page reload.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::advisor::{AdvisorReply, ChatTranscript};
use crate::config::Config;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::risk::RiskFilter;
use crate::scenario::{self, Preset, ScenarioOutcome, ScenarioVariable};
use crate::users::TeamDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Analyst,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard,
    EditScenarios,
    UseAdvisor,
    ExportReports,
    ManageTeam,
}

impl Role {
    pub fn allows(&self, p: Permission) -> bool {
        match (self, p) {
            (Role::Admin, _) => true,
            (Role::Analyst, Permission::ManageTeam) => false,
            (Role::Analyst, _) => true,
            (Role::Viewer, Permission::ViewDashboard) => true,
            (Role::Viewer, Permission::EditScenarios)
            | (Role::Viewer, Permission::UseAdvisor)
            | (Role::Viewer, Permission::ExportReports)
            | (Role::Viewer, Permission::ManageTeam) => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Analyst => "analyst",
            Role::Viewer => "viewer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Starter,
    Professional,
    Enterprise,
}

impl Plan {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "starter" => Some(Plan::Starter),
            "professional" | "pro" => Some(Plan::Professional),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Starter => "starter",
            Plan::Professional => "professional",
            Plan::Enterprise => "enterprise",
        }
    }

    /// `None` means unlimited.
    pub fn seat_limit(&self) -> Option<usize> {
        match self {
            Plan::Starter => Some(3),
            Plan::Professional => Some(10),
            Plan::Enterprise => None,
        }
    }

    pub fn advisor_included(&self) -> bool {
        match self {
            Plan::Starter => false,
            Plan::Professional | Plan::Enterprise => true,
        }
    }

    pub fn export_included(&self) -> bool {
        match self {
            Plan::Starter | Plan::Professional => false,
            Plan::Enterprise => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardTab {
    #[default]
    Overview,
    Scenarios,
    Forecasts,
    Risks,
    Advisor,
    Team,
}

impl DashboardTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardTab::Overview => "overview",
            DashboardTab::Scenarios => "scenarios",
            DashboardTab::Forecasts => "forecasts",
            DashboardTab::Risks => "risks",
            DashboardTab::Advisor => "advisor",
            DashboardTab::Team => "team",
        }
    }

    /// Permission needed to open the tab.
    pub fn required(&self) -> Permission {
        match self {
            DashboardTab::Overview | DashboardTab::Forecasts | DashboardTab::Risks => Permission::ViewDashboard,
            DashboardTab::Scenarios => Permission::EditScenarios,
            DashboardTab::Advisor => Permission::UseAdvisor,
            DashboardTab::Team => Permission::ManageTeam,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    ReviewKpis,
    RunScenario,
    AskAdvisor,
    InviteTeam,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 4] = [
        OnboardingStep::ReviewKpis,
        OnboardingStep::RunScenario,
        OnboardingStep::AskAdvisor,
        OnboardingStep::InviteTeam,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Onboarding {
    completed: Vec<OnboardingStep>,
}

impl Onboarding {
    pub fn complete(&mut self, step: OnboardingStep) {
        if !self.completed.contains(&step) {
            self.completed.push(step);
            self.completed.sort();
        }
    }

    pub fn is_done(&self, step: OnboardingStep) -> bool {
        self.completed.contains(&step)
    }

    /// First step not yet completed.
    pub fn next_step(&self) -> Option<OnboardingStep> {
        OnboardingStep::ALL.into_iter().find(|s| !self.is_done(*s))
    }

    /// 0-100
    pub fn progress_pct(&self) -> u8 {
        (self.completed.len() * 100 / OnboardingStep::ALL.len()) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub live_data: bool,
    pub advisor: bool,
    pub export: bool,
}

impl FeatureFlags {
    pub fn for_plan(plan: Plan) -> Self {
        Self {
            live_data: true,
            advisor: plan.advisor_included(),
            export: plan.export_included(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub plan: Plan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Granted,
    Denied(Permission),
    NotInPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    pub user: DemoUser,
    pub active_tab: DashboardTab,
    pub onboarding: Onboarding,
    pub flags: FeatureFlags,
    pub scenario: Vec<ScenarioVariable>,
    pub chat: ChatTranscript,
    pub risk_filter: RiskFilter,
    pub team: TeamDirectory,
    pub started_at: u64,
}

impl AppState {
    pub fn new(cfg: &Config, now: u64) -> Self {
        let user = DemoUser {
            name: cfg.demo_user.clone(),
            email: cfg.demo_email.clone(),
            role: Role::Admin,
            plan: cfg.demo_plan,
        };
        let team = TeamDirectory::seeded(&user.name, &user.email, now, user.plan.seat_limit());
        let state = Self {
            flags: FeatureFlags::for_plan(user.plan),
            user,
            active_tab: DashboardTab::default(),
            onboarding: Onboarding::default(),
            scenario: scenario::default_variables(),
            chat: ChatTranscript::new(),
            risk_filter: RiskFilter::default(),
            team,
            started_at: now,
        };
        log(
            Level::Info,
            Domain::Session,
            "session_start",
            obj(&[
                ("user", v_str(&state.user.name)),
                ("plan", v_str(state.user.plan.as_str())),
                ("role", v_str(state.user.role.as_str())),
            ]),
        );
        state
    }

    /// Back to the freshly-initialized state for the same user and plan.
    pub fn reset(&mut self) {
        self.active_tab = DashboardTab::default();
        self.onboarding = Onboarding::default();
        self.flags = FeatureFlags::for_plan(self.user.plan);
        for v in self.scenario.iter_mut() {
            v.reset();
        }
        self.chat.clear();
        self.risk_filter = RiskFilter::default();
        self.team = TeamDirectory::seeded(&self.user.name, &self.user.email, self.started_at, self.user.plan.seat_limit());
        log(Level::Info, Domain::Session, "session_reset", obj(&[("user", v_str(&self.user.name))]));
    }

    pub fn access(&self, tab: DashboardTab) -> Access {
        let needed = tab.required();
        if !self.user.role.allows(needed) {
            return Access::Denied(needed);
        }
        let in_plan = match tab {
            DashboardTab::Advisor => self.flags.advisor,
            DashboardTab::Overview
            | DashboardTab::Scenarios
            | DashboardTab::Forecasts
            | DashboardTab::Risks
            | DashboardTab::Team => true,
        };
        if in_plan {
            Access::Granted
        } else {
            Access::NotInPlan
        }
    }

    /// Switch tabs; a tab the user cannot open leaves the current one active.
    pub fn open_tab(&mut self, tab: DashboardTab) -> Access {
        let access = self.access(tab);
        if access == Access::Granted {
            self.active_tab = tab;
            if tab == DashboardTab::Overview {
                self.onboarding.complete(OnboardingStep::ReviewKpis);
            }
        }
        access
    }

    pub fn set_slider(&mut self, id: &str, value: f64) -> bool {
        match self.scenario.iter_mut().find(|v| v.id == id) {
            Some(v) => {
                v.set_value(value);
                true
            }
            None => false,
        }
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        preset.apply(&mut self.scenario);
    }

    pub fn evaluate_scenario(&mut self) -> ScenarioOutcome {
        let out = scenario::evaluate(&self.scenario);
        self.onboarding.complete(OnboardingStep::RunScenario);
        log(
            Level::Info,
            Domain::Scenario,
            "scenario_evaluated",
            obj(&[
                ("score", v_num(out.score as f64)),
                ("revenue", v_num(out.revenue)),
                ("risk", v_num(out.risk)),
                ("recommendation", v_str(out.recommendation.message())),
            ]),
        );
        out
    }

    /// `open_tab` for callers that cannot proceed without the tab.
    pub fn enter_tab(&mut self, tab: DashboardTab) -> Result<()> {
        match self.open_tab(tab) {
            Access::Granted => Ok(()),
            Access::NotInPlan => {
                log(
                    Level::Warn,
                    Domain::Session,
                    "tab_not_in_plan",
                    obj(&[("tab", v_str(tab.as_str())), ("plan", v_str(self.user.plan.as_str()))]),
                );
                Err(anyhow!("{} is not included in the {} plan", tab.as_str(), self.user.plan.as_str()))
            }
            Access::Denied(p) => {
                log(
                    Level::Warn,
                    Domain::Session,
                    "tab_denied",
                    obj(&[("tab", v_str(tab.as_str())), ("role", v_str(self.user.role.as_str()))]),
                );
                Err(anyhow!("role {} lacks {:?}", self.user.role.as_str(), p))
            }
        }
    }

    fn require(&self, needed: Permission, event: &str) -> Result<()> {
        if self.user.role.allows(needed) {
            return Ok(());
        }
        log(
            Level::Warn,
            Domain::Session,
            "permission_denied",
            obj(&[("action", v_str(event)), ("role", v_str(self.user.role.as_str()))]),
        );
        Err(anyhow!("role {} may not {}", self.user.role.as_str(), event))
    }

    /// Invite a member under the plan's seat limit.
    pub fn invite_member(&mut self, name: &str, email: &str, role: Role, now: u64) -> Result<u32> {
        self.require(Permission::ManageTeam, "invite_member")?;
        let id = self.team.invite(name, email, role, self.user.plan.seat_limit(), now)?;
        self.onboarding.complete(OnboardingStep::InviteTeam);
        log(
            Level::Info,
            Domain::Session,
            "member_invited",
            obj(&[
                ("member_id", v_num(id as f64)),
                ("role", v_str(role.as_str())),
                ("seats_used", v_num(self.team.seats_used() as f64)),
            ]),
        );
        Ok(id)
    }

    pub fn change_member_role(&mut self, id: u32, role: Role) -> Result<()> {
        self.require(Permission::ManageTeam, "change_member_role")?;
        self.team.change_role(id, role)?;
        log(
            Level::Info,
            Domain::Session,
            "member_role_changed",
            obj(&[("member_id", v_num(id as f64)), ("role", v_str(role.as_str()))]),
        );
        Ok(())
    }

    pub fn deactivate_member(&mut self, id: u32) -> Result<()> {
        self.require(Permission::ManageTeam, "deactivate_member")?;
        self.team.deactivate(id)?;
        log(
            Level::Info,
            Domain::Session,
            "member_deactivated",
            obj(&[
                ("member_id", v_num(id as f64)),
                ("seats_used", v_num(self.team.seats_used() as f64)),
            ]),
        );
        Ok(())
    }

    pub fn record_exchange(&mut self, question: &str, reply: &AdvisorReply, now: u64) {
        self.chat.push_exchange(question, reply, now);
        self.onboarding.complete(OnboardingStep::AskAdvisor);
        log(
            Level::Info,
            Domain::Advisor,
            "advisor_reply",
            obj(&[
                ("tier", v_str(reply.tier.as_str())),
                ("confidence", v_num(reply.confidence as f64)),
                ("matched", v_num(reply.matched_keywords as f64)),
            ]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{default_catalog, respond};

    fn state(plan: Plan) -> AppState {
        let cfg = Config {
            demo_plan: plan,
            ..Config::default()
        };
        AppState::new(&cfg, 1_000_000)
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.allows(Permission::ManageTeam));
        assert!(Role::Analyst.allows(Permission::EditScenarios));
        assert!(!Role::Analyst.allows(Permission::ManageTeam));
        assert!(Role::Viewer.allows(Permission::ViewDashboard));
        assert!(!Role::Viewer.allows(Permission::UseAdvisor));
    }

    #[test]
    fn test_starter_plan_has_no_advisor() {
        let mut s = state(Plan::Starter);
        assert_eq!(s.open_tab(DashboardTab::Advisor), Access::NotInPlan);
        assert_eq!(s.active_tab, DashboardTab::Overview);
        assert_eq!(s.open_tab(DashboardTab::Risks), Access::Granted);
        assert_eq!(s.active_tab, DashboardTab::Risks);
    }

    #[test]
    fn test_enter_tab_refuses_outside_plan() {
        let mut s = state(Plan::Starter);
        let err = s.enter_tab(DashboardTab::Advisor).unwrap_err();
        assert!(err.to_string().contains("starter"));
        assert_eq!(s.active_tab, DashboardTab::Overview);

        let mut s = state(Plan::Professional);
        s.enter_tab(DashboardTab::Advisor).unwrap();
        assert_eq!(s.active_tab, DashboardTab::Advisor);
        s.user.role = Role::Viewer;
        assert!(s.enter_tab(DashboardTab::Scenarios).is_err());
    }

    #[test]
    fn test_viewer_denied_scenarios() {
        let mut s = state(Plan::Enterprise);
        s.user.role = Role::Viewer;
        assert_eq!(s.open_tab(DashboardTab::Scenarios), Access::Denied(Permission::EditScenarios));
    }

    #[test]
    fn test_onboarding_progress() {
        let mut o = Onboarding::default();
        assert_eq!(o.next_step(), Some(OnboardingStep::ReviewKpis));
        o.complete(OnboardingStep::ReviewKpis);
        o.complete(OnboardingStep::ReviewKpis);
        assert_eq!(o.progress_pct(), 25);
        for step in OnboardingStep::ALL {
            o.complete(step);
        }
        assert_eq!(o.progress_pct(), 100);
        assert_eq!(o.next_step(), None);
    }

    #[test]
    fn test_slider_and_reset() {
        let mut s = state(Plan::Professional);
        assert!(s.set_slider("price_change", 999.0));
        assert!(!s.set_slider("missing", 1.0));
        let out = s.evaluate_scenario();
        assert_ne!(out.score, 0);
        assert!(s.onboarding.is_done(OnboardingStep::RunScenario));

        let reply = respond("revenue growth", &default_catalog());
        s.record_exchange("revenue growth", &reply, 5);
        s.open_tab(DashboardTab::Team);
        s.reset();
        assert_eq!(s.active_tab, DashboardTab::Overview);
        assert!(s.chat.is_empty());
        assert_eq!(s.onboarding.progress_pct(), 0);
        assert_eq!(s.evaluate_scenario().score, 76);
    }

    #[test]
    fn test_plan_limits() {
        assert_eq!(Plan::Starter.seat_limit(), Some(3));
        assert_eq!(Plan::Enterprise.seat_limit(), None);
        assert_eq!(Plan::parse("PRO"), Some(Plan::Professional));
        assert!(FeatureFlags::for_plan(Plan::Enterprise).export);
    }

    #[test]
    fn test_starter_plan_caps_seats() {
        let mut s = state(Plan::Starter);
        assert_eq!(s.team.seats_used(), 3);
        let err = s.invite_member("Dana Ruiz", "dana@example.com", Role::Viewer, 10).unwrap_err();
        assert!(err.to_string().contains("seat limit"));
        assert!(!s.onboarding.is_done(OnboardingStep::InviteTeam));

        s.deactivate_member(2).unwrap();
        let id = s.invite_member("Dana Ruiz", "dana@example.com", Role::Viewer, 10).unwrap();
        assert_eq!(s.team.seats_used(), 3);
        assert!(s.team.get(id).is_some());
        assert!(s.invite_member("Eli Park", "eli@example.com", Role::Viewer, 11).is_err());
    }

    #[test]
    fn test_team_actions_need_manage_permission() {
        let mut s = state(Plan::Enterprise);
        for role in [Role::Viewer, Role::Analyst] {
            s.user.role = role;
            assert!(s.invite_member("Dana Ruiz", "dana@example.com", Role::Viewer, 10).is_err());
            assert!(s.change_member_role(2, Role::Viewer).is_err());
            assert!(s.deactivate_member(3).is_err());
        }
        assert_eq!(s.team.seats_used(), 5);
        assert_eq!(s.team.get(2).map(|m| m.role), Some(Role::Analyst));

        s.user.role = Role::Admin;
        s.change_member_role(2, Role::Viewer).unwrap();
        assert_eq!(s.team.get(2).map(|m| m.role), Some(Role::Viewer));
    }

    #[test]
    fn test_onboarding_completes_through_session() {
        let mut s = state(Plan::Professional);
        s.open_tab(DashboardTab::Overview);
        s.evaluate_scenario();
        let reply = respond("revenue growth", &default_catalog());
        s.record_exchange("revenue growth", &reply, 5);
        s.invite_member("Dana Ruiz", "dana@example.com", Role::Analyst, 10).unwrap();
        assert_eq!(s.onboarding.progress_pct(), 100);
        assert_eq!(s.onboarding.next_step(), None);
    }
}
