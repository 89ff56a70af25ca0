//! Text and JSON rendering of command results.

use std::fmt::Write as _;

use anyhow::Context;
use marketplace::{
    Complaint, Message, Notification, Payment, Profile, Property, PropertyViewing, Renovation,
    Rental, RentalRequest,
};
use serde::Serialize;
use serde_json::{json, Value};
use workflows::{ConversationSummary, LandlordDashboard, PaymentSummary, StudentDashboard};

/// What a command produced, in both output forms.
#[derive(Debug, Clone)]
pub struct Report {
    value: Value,
    text: String,
}

impl Report {
    pub fn new<T: Serialize>(value: &T, text: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            value: serde_json::to_value(value).context("failed to encode output")?,
            text: text.into(),
        })
    }

    pub fn message(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: json!({ "message": text }),
            text,
        }
    }

    /// A list rendered one line per item, or `empty` when there is none.
    pub fn list<T: Serialize>(
        items: &[T],
        empty: &str,
        line: impl Fn(&T) -> String,
    ) -> anyhow::Result<Self> {
        let text = if items.is_empty() {
            empty.to_owned()
        } else {
            items.iter().map(line).collect::<Vec<_>>().join("\n")
        };
        Self::new(&items, text)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn render(&self, json: bool) -> String {
        if json {
            serde_json::to_string_pretty(&self.value).unwrap_or_else(|_| self.value.to_string())
        } else {
            self.text.clone()
        }
    }
}

pub fn profile(p: &Profile) -> String {
    let mut out = format!("{} <{}> ({})\nid: {}", p.full_name, p.email, p.role, p.id);
    if let Some(phone) = &p.phone {
        let _ = write!(out, "\nphone: {phone}");
    }
    if let Some(university) = &p.university {
        let _ = write!(out, "\nuniversity: {university}");
    }
    out
}

pub fn property_line(p: &Property) -> String {
    format!(
        "{}  {} ({}), {} / month, {}/{} rooms free{}",
        p.id,
        p.title,
        p.city,
        p.monthly_rent,
        p.available_rooms,
        p.total_rooms,
        if p.is_available { "" } else { ", closed" }
    )
}

pub fn property(p: &Property) -> String {
    let mut out = format!(
        "{}\n{}, {}\n{} | {} / month | {} of {} rooms free | {}\nid: {}\nlandlord: {}",
        p.title,
        p.address,
        p.city,
        p.kind,
        p.monthly_rent,
        p.available_rooms,
        p.total_rooms,
        if p.is_available { "open" } else { "closed" },
        p.id,
        p.landlord_id,
    );
    if !p.description.is_empty() {
        let _ = write!(out, "\n\n{}", p.description);
    }
    if !p.amenities.is_empty() {
        let _ = write!(out, "\namenities: {}", p.amenities.join(", "));
    }
    for url in &p.image_urls {
        let _ = write!(out, "\nimage: {url}");
    }
    out
}

pub fn request_line(r: &RentalRequest) -> String {
    format!(
        "{}  {}  property {} from {}, student {}",
        r.id, r.status, r.property_id, r.desired_move_in, r.student_id
    )
}

pub fn rental_line(r: &Rental) -> String {
    let period = match r.end_date {
        Some(end) => format!("{} to {end}", r.start_date),
        None => format!("since {}", r.start_date),
    };
    format!(
        "{}  {}  property {} room {}, {period}, {} / month, student {}",
        r.id, r.status, r.property_id, r.room_number, r.monthly_rent, r.student_id
    )
}

pub fn viewing_line(v: &PropertyViewing) -> String {
    format!(
        "{}  {}  property {} at {}, student {}",
        v.id, v.status, v.property_id, v.scheduled_for, v.student_id
    )
}

pub fn message_line(m: &Message) -> String {
    format!(
        "[{}] {}{}: {}",
        m.created_at,
        m.sender_id,
        if m.read { "" } else { " (new)" },
        m.body
    )
}

pub fn conversation_line(c: &ConversationSummary) -> String {
    format!(
        "{}  {} unread  last: {}",
        c.counterpart_id, c.unread, c.last_message.body
    )
}

pub fn complaint_line(c: &Complaint) -> String {
    format!(
        "{}  {} [{} {}] {}  rental {}",
        c.id, c.status, c.priority, c.category, c.title, c.rental_id
    )
}

pub fn renovation_line(r: &Renovation) -> String {
    let end = r.end_date.map(|d| format!(" to {d}")).unwrap_or_default();
    let cost = r.cost.map(|c| format!(", cost {c}")).unwrap_or_default();
    format!(
        "{}  {}  {}  property {} from {}{end}{cost}",
        r.id, r.status, r.title, r.property_id, r.start_date
    )
}

pub fn payment_line(p: &Payment) -> String {
    let paid = match (p.paid_at, p.method) {
        (Some(at), Some(method)) => format!(", paid {} by {method}", at.date()),
        (Some(at), None) => format!(", paid {}", at.date()),
        _ => String::new(),
    };
    format!(
        "{}  {}  {} for period {} due {}, rental {}{paid}",
        p.id, p.status, p.amount, p.period_start, p.due_date, p.rental_id
    )
}

pub fn payment_summary(s: &PaymentSummary) -> String {
    format!(
        "paid {} | outstanding {} | late {}",
        s.paid, s.outstanding, s.late_count
    )
}

pub fn notification_line(n: &Notification) -> String {
    format!(
        "{} {}  {}: {}",
        if n.read { " " } else { "*" },
        n.id,
        n.title,
        n.body
    )
}

pub fn landlord_dashboard(d: &LandlordDashboard) -> String {
    format!(
        "properties: {}\n\
         available rooms: {}\n\
         pending requests: {}\n\
         upcoming viewings: {}\n\
         open complaints: {}\n\
         active rentals: {}\n\
         outstanding payments: {}",
        d.properties,
        d.available_rooms,
        d.pending_requests,
        d.upcoming_viewings,
        d.open_complaints,
        d.active_rentals,
        d.outstanding_payments
    )
}

pub fn student_dashboard(d: &StudentDashboard) -> String {
    format!(
        "pending requests: {}\n\
         active rentals: {}\n\
         upcoming viewings: {}\n\
         open complaints: {}\n\
         unread messages: {}\n\
         unread notifications: {}",
        d.pending_requests,
        d.active_rentals,
        d.upcoming_viewings,
        d.open_complaints,
        d.unread_messages,
        d.unread_notifications
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_render_placeholder_or_lines() {
        let empty: Vec<u32> = Vec::new();
        let report = Report::list(&empty, "Nothing here.", |n| n.to_string()).unwrap();
        assert_eq!(report.render(false), "Nothing here.");
        assert_eq!(report.render(true), "[]");

        let report = Report::list(&[1, 2], "-", |n| format!("#{n}")).unwrap();
        assert_eq!(report.text(), "#1\n#2");
        assert_eq!(report.value(), &json!([1, 2]));
    }

    #[test]
    fn messages_render_as_json_objects() {
        let report = Report::message("Signed out.");
        assert_eq!(report.value()["message"], "Signed out.");
        assert_eq!(report.render(false), "Signed out.");
    }
}
