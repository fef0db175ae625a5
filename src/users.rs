//! Team directory behind the user/role management screen.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::session::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Invited,
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: MemberStatus,
    pub last_active: u64,
}

impl TeamMember {
    /// Deactivated members do not hold a seat.
    pub fn holds_seat(&self) -> bool {
        self.status != MemberStatus::Deactivated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    LastActive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberQuery {
    /// Case-insensitive match on name or e-mail.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<MemberStatus>,
}

impl MemberQuery {
    fn matches(&self, m: &TeamMember) -> bool {
        let text_ok = match &self.search {
            Some(q) if !q.trim().is_empty() => {
                let q = q.trim().to_lowercase();
                m.name.to_lowercase().contains(&q) || m.email.to_lowercase().contains(&q)
            }
            _ => true,
        };
        text_ok
            && self.role.map_or(true, |r| m.role == r)
            && self.status.map_or(true, |s| m.status == s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamDirectory {
    members: Vec<TeamMember>,
    next_id: u32,
}

impl TeamDirectory {
    pub fn new() -> Self {
        Self { members: Vec::new(), next_id: 1 }
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn get(&self, id: u32) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn seats_used(&self) -> usize {
        self.members.iter().filter(|m| m.holds_seat()).count()
    }

    fn insert(&mut self, name: &str, email: &str, role: Role, status: MemberStatus, last_active: u64) -> Result<u32> {
        let email = email.trim().to_lowercase();
        if name.trim().is_empty() {
            return Err(anyhow!("member name is empty"));
        }
        if !email.contains('@') {
            return Err(anyhow!("invalid e-mail: {}", email));
        }
        if self.members.iter().any(|m| m.email == email) {
            return Err(anyhow!("{} is already on the team", email));
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.members.push(TeamMember {
            id,
            name: name.trim().to_string(),
            email,
            role,
            status,
            last_active,
        });
        Ok(id)
    }

    /// Add an invited member. Fails on a duplicate e-mail or when no seat is
    /// left under `seat_limit` (`None` = unlimited).
    pub fn invite(&mut self, name: &str, email: &str, role: Role, seat_limit: Option<usize>, now: u64) -> Result<u32> {
        if let Some(limit) = seat_limit {
            if self.seats_used() >= limit {
                return Err(anyhow!("seat limit reached ({} of {})", self.seats_used(), limit));
            }
        }
        self.insert(name, email, role, MemberStatus::Invited, now)
    }

    pub fn change_role(&mut self, id: u32, role: Role) -> Result<()> {
        if role != Role::Admin && self.is_last_admin(id) {
            return Err(anyhow!("cannot demote the last active admin"));
        }
        let m = self.members.iter_mut().find(|m| m.id == id).ok_or_else(|| anyhow!("no member {}", id))?;
        m.role = role;
        Ok(())
    }

    pub fn deactivate(&mut self, id: u32) -> Result<()> {
        if self.is_last_admin(id) {
            return Err(anyhow!("cannot deactivate the last active admin"));
        }
        let m = self.members.iter_mut().find(|m| m.id == id).ok_or_else(|| anyhow!("no member {}", id))?;
        m.status = MemberStatus::Deactivated;
        Ok(())
    }

    /// Mark an invited member as active.
    pub fn accept(&mut self, id: u32, now: u64) -> Result<()> {
        let m = self.members.iter_mut().find(|m| m.id == id).ok_or_else(|| anyhow!("no member {}", id))?;
        match m.status {
            MemberStatus::Invited => {
                m.status = MemberStatus::Active;
                m.last_active = now;
                Ok(())
            }
            MemberStatus::Active => Ok(()),
            MemberStatus::Deactivated => Err(anyhow!("member {} is deactivated", id)),
        }
    }

    fn is_last_admin(&self, id: u32) -> bool {
        let active_admins: Vec<u32> = self
            .members
            .iter()
            .filter(|m| m.role == Role::Admin && m.status == MemberStatus::Active)
            .map(|m| m.id)
            .collect();
        active_admins == [id]
    }

    pub fn query(&self, q: &MemberQuery, sort: SortKey) -> Vec<&TeamMember> {
        let mut out: Vec<&TeamMember> = self.members.iter().filter(|m| q.matches(m)).collect();
        match sort {
            SortKey::Name => out.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
            SortKey::LastActive => out.sort_by(|a, b| b.last_active.cmp(&a.last_active)),
        }
        out
    }

    /// Demo roster; `owner` becomes the active admin. Seat-holding entries
    /// past `seat_limit` are left out.
    pub fn seeded(owner_name: &str, owner_email: &str, now: u64, seat_limit: Option<usize>) -> Self {
        let mut dir = Self::new();
        let roster: [(&str, &str, Role, MemberStatus, u64); 6] = [
            (owner_name, owner_email, Role::Admin, MemberStatus::Active, 0),
            ("Sarah Chen", "sarah.chen@example.com", Role::Analyst, MemberStatus::Active, 3_600),
            ("Marcus Webb", "marcus.webb@example.com", Role::Analyst, MemberStatus::Active, 86_400),
            ("Priya Natarajan", "priya.n@example.com", Role::Viewer, MemberStatus::Active, 7_200),
            ("Tom Alvarez", "tom.alvarez@example.com", Role::Viewer, MemberStatus::Invited, 172_800),
            ("Lena Fischer", "lena.fischer@example.com", Role::Analyst, MemberStatus::Deactivated, 2_592_000),
        ];
        for (name, email, role, status, ago) in roster {
            let takes_seat = status != MemberStatus::Deactivated;
            if takes_seat && seat_limit.map_or(false, |limit| dir.seats_used() >= limit) {
                continue;
            }
            // roster e-mails are distinct unless the owner reuses one; skip it then
            let _ = dir.insert(name, email, role, status, now.saturating_sub(ago));
        }
        dir
    }
}
