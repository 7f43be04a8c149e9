//! Email templates for each notification kind.
//!
//! Templates only read the item payload, so a redelivered item renders the
//! same emails as the first delivery.

use wf_common::env::{env_opt, env_or};
use wf_common::{NotificationKind, OutboxItem};

use crate::mailer::EmailMessage;

/// Values that are not part of the item payload.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub frontend_url: String,
    pub admin_email: Option<String>,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            admin_email: None,
        }
    }
}

impl TemplateContext {
    pub fn from_env() -> Self {
        Self {
            frontend_url: env_or("WF_FRONTEND_URL", "http://localhost:5173"),
            admin_email: env_opt("WF_ADMIN_EMAIL"),
        }
    }
}

pub fn render(item: &OutboxItem, ctx: &TemplateContext) -> Vec<EmailMessage> {
    match item.kind {
        NotificationKind::ApplicationSubmitted => application_submitted(item, ctx),
        NotificationKind::ApplicationShortlisted => vec![application_shortlisted(item, ctx)],
        NotificationKind::ApplicationRejected => vec![application_rejected(item)],
        NotificationKind::PaymentCaptured => vec![payment_captured(item, ctx)],
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn dashboard_url(ctx: &TemplateContext) -> String {
    format!("{}/dashboard", ctx.frontend_url.trim_end_matches('/'))
}

fn application_submitted(item: &OutboxItem, ctx: &TemplateContext) -> Vec<EmailMessage> {
    let name = item.payload_str("fullName");
    let mut emails = vec![EmailMessage {
        to: item.recipient.clone(),
        subject: "Application Submitted - Wyffle Internship".to_string(),
        html: format!(
            "<h2>Application Submitted Successfully!</h2>\
             <p>Dear {},</p>\
             <p>Thank you for applying to the Wyffle Internship Program. We have received your application and our team will review it shortly.</p>\
             <p>You will receive an email notification once your application status is updated.</p>\
             <p>Best regards,<br>Wyffle Team</p>",
            escape(name)
        ),
        text: format!(
            "Dear {},\n\nThank you for applying to the Wyffle Internship Program. \
             We have received your application and our team will review it shortly.\n\n\
             Best regards,\nWyffle Team",
            name
        ),
    }];

    if let Some(admin) = &ctx.admin_email {
        let college = item.payload_str("college");
        let skills = item
            .payload
            .get("skills")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "N/A".to_string());

        emails.push(EmailMessage {
            to: admin.clone(),
            subject: "New Internship Application - Wyffle".to_string(),
            html: format!(
                "<h2>New Application Received</h2>\
                 <p>A new internship application has been submitted:</p>\
                 <ul><li><strong>Name:</strong> {}</li><li><strong>Email:</strong> {}</li>\
                 <li><strong>College:</strong> {}</li><li><strong>Skills:</strong> {}</li></ul>\
                 <p>Please review the application in the admin panel.</p>",
                escape(name),
                escape(&item.recipient),
                escape(college),
                escape(&skills)
            ),
            text: format!(
                "New application received\nName: {}\nEmail: {}\nCollege: {}\nSkills: {}",
                name, item.recipient, college, skills
            ),
        });
    }

    emails
}

fn application_shortlisted(item: &OutboxItem, ctx: &TemplateContext) -> EmailMessage {
    let name = item.payload_str("fullName");
    let currency = item.payload_str("currency");
    let course_price = item.payload.get("coursePrice").and_then(|v| v.as_i64()).unwrap_or_default();
    let discount_price = item.payload.get("discountPrice").and_then(|v| v.as_i64()).unwrap_or_default();
    let coupon = item.payload_str("couponCode");
    let dashboard = dashboard_url(ctx);

    EmailMessage {
        to: item.recipient.clone(),
        subject: "Congratulations! You have been shortlisted - Wyffle Internship".to_string(),
        html: format!(
            "<h2>Congratulations!</h2>\
             <p>Dear {},</p>\
             <p>Great news! Your application for the Wyffle Internship Program has been <strong>shortlisted</strong>.</p>\
             <p>You can now proceed with the payment to secure your spot in the program.</p>\
             <ul><li>Course Fee: {} {}</li>\
             <li>Use coupon code <strong>{}</strong> to get the discounted price of {} {}</li></ul>\
             <p>Login to your dashboard: <a href=\"{}\">Dashboard</a></p>\
             <p>Best regards,<br>Wyffle Team</p>",
            escape(name),
            currency,
            course_price,
            escape(coupon),
            currency,
            discount_price,
            dashboard
        ),
        text: format!(
            "Dear {},\n\nYour application has been shortlisted. Course fee: {} {}. \
             Use coupon {} for {} {}.\nDashboard: {}\n\nBest regards,\nWyffle Team",
            name, currency, course_price, coupon, currency, discount_price, dashboard
        ),
    }
}

fn application_rejected(item: &OutboxItem) -> EmailMessage {
    let name = item.payload_str("fullName");
    EmailMessage {
        to: item.recipient.clone(),
        subject: "Application Update - Wyffle Internship".to_string(),
        html: format!(
            "<h2>Application Update</h2>\
             <p>Dear {},</p>\
             <p>Thank you for your interest in the Wyffle Internship Program. After careful consideration, \
             we regret to inform you that we cannot move forward with your application at this time.</p>\
             <p>We encourage you to apply for future programs and continue developing your skills.</p>\
             <p>Best regards,<br>Wyffle Team</p>",
            escape(name)
        ),
        text: format!(
            "Dear {},\n\nThank you for your interest in the Wyffle Internship Program. \
             We cannot move forward with your application at this time.\n\nBest regards,\nWyffle Team",
            name
        ),
    }
}

fn payment_captured(item: &OutboxItem, ctx: &TemplateContext) -> EmailMessage {
    let name = item.payload_str("fullName");
    let payment_id = item.payload_str("paymentId");
    let currency = item.payload_str("currency");
    let amount = item.payload.get("amount").and_then(|v| v.as_i64()).unwrap_or_default();
    let paid_on = item.payload_str("paidOn");
    let dashboard = dashboard_url(ctx);

    EmailMessage {
        to: item.recipient.clone(),
        subject: "Payment Successful - Welcome to Wyffle Internship!".to_string(),
        html: format!(
            "<h2>Payment Successful! Welcome aboard!</h2>\
             <p>Dear {},</p>\
             <p>Your payment has been processed successfully and you are now enrolled in the Wyffle Internship Program.</p>\
             <h3>Payment Details:</h3>\
             <ul><li><strong>Payment ID:</strong> {}</li><li><strong>Amount Paid:</strong> {} {}</li>\
             <li><strong>Date:</strong> {}</li></ul>\
             <p>Your internship is now <strong>active</strong>. Access your dashboard: <a href=\"{}\">Dashboard</a></p>\
             <p>Best regards,<br>Wyffle Team</p>",
            escape(name),
            escape(payment_id),
            currency,
            amount,
            paid_on,
            dashboard
        ),
        text: format!(
            "Dear {},\n\nPayment {} of {} {} received on {}. Your internship is now active.\n\
             Dashboard: {}\n\nBest regards,\nWyffle Team",
            name, payment_id, currency, amount, paid_on, dashboard
        ),
    }
}
