//! Named notification templates with `{{placeholder}}` substitution.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use agencia_check_core::{NotificationCategory, NotificationKind, NotificationPriority};

/// Template names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    SaleCreated,
    PaymentReceived,
    LowStock,
    ResellerRegistered,
    BackupCompleted,
    BackupFailed,
    SystemAlert,
    UserLogin,
}

impl TemplateId {
    /// Every template.
    pub const ALL: [Self; 8] = [
        Self::SaleCreated,
        Self::PaymentReceived,
        Self::LowStock,
        Self::ResellerRegistered,
        Self::BackupCompleted,
        Self::BackupFailed,
        Self::SystemAlert,
        Self::UserLogin,
    ];

    /// Stable name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SaleCreated => "sale_created",
            Self::PaymentReceived => "payment_received",
            Self::LowStock => "low_stock",
            Self::ResellerRegistered => "reseller_registered",
            Self::BackupCompleted => "backup_completed",
            Self::BackupFailed => "backup_failed",
            Self::SystemAlert => "system_alert",
            Self::UserLogin => "user_login",
        }
    }

    /// The template definition.
    #[must_use]
    pub const fn template(&self) -> &'static Template {
        match self {
            Self::SaleCreated => &SALE_CREATED,
            Self::PaymentReceived => &PAYMENT_RECEIVED,
            Self::LowStock => &LOW_STOCK,
            Self::ResellerRegistered => &RESELLER_REGISTERED,
            Self::BackupCompleted => &BACKUP_COMPLETED,
            Self::BackupFailed => &BACKUP_FAILED,
            Self::SystemAlert => &SYSTEM_ALERT,
            Self::UserLogin => &USER_LOGIN,
        }
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown notification template: {s}"))
    }
}

/// A notification blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub kind: NotificationKind,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub title: &'static str,
    pub message: &'static str,
    pub auto_close: Option<u32>,
    pub persistent: bool,
    pub action_url: Option<&'static str>,
}

const SALE_CREATED: Template = Template {
    kind: NotificationKind::Success,
    category: NotificationCategory::Sales,
    priority: NotificationPriority::Medium,
    title: "Nova venda registrada",
    message: "Venda #{{sale_id}} no valor de {{value}} foi registrada.",
    auto_close: Some(5000),
    persistent: false,
    action_url: Some("/vendas"),
};

const PAYMENT_RECEIVED: Template = Template {
    kind: NotificationKind::Success,
    category: NotificationCategory::Payments,
    priority: NotificationPriority::High,
    title: "Pagamento recebido",
    message: "Pagamento de {{value}} recebido via {{method}} (venda #{{sale_id}}).",
    auto_close: Some(5000),
    persistent: false,
    action_url: Some("/pagamentos"),
};

const LOW_STOCK: Template = Template {
    kind: NotificationKind::Warning,
    category: NotificationCategory::Inventory,
    priority: NotificationPriority::High,
    title: "Estoque baixo",
    message: "{{product}} está com apenas {{quantity}} unidades (mínimo {{min_quantity}}).",
    auto_close: None,
    persistent: true,
    action_url: Some("/estoque"),
};

const RESELLER_REGISTERED: Template = Template {
    kind: NotificationKind::Info,
    category: NotificationCategory::Resellers,
    priority: NotificationPriority::Medium,
    title: "Novo revendedor",
    message: "{{name}} foi cadastrado como revendedor.",
    auto_close: Some(5000),
    persistent: false,
    action_url: Some("/revendedores"),
};

const BACKUP_COMPLETED: Template = Template {
    kind: NotificationKind::Success,
    category: NotificationCategory::Backup,
    priority: NotificationPriority::Low,
    title: "Backup concluído",
    message: "O backup \"{{name}}\" foi concluído ({{size}}).",
    auto_close: Some(5000),
    persistent: false,
    action_url: Some("/backups"),
};

const BACKUP_FAILED: Template = Template {
    kind: NotificationKind::Error,
    category: NotificationCategory::Backup,
    priority: NotificationPriority::Urgent,
    title: "Falha no backup",
    message: "O backup \"{{name}}\" falhou: {{error}}",
    auto_close: None,
    persistent: true,
    action_url: Some("/backups"),
};

const SYSTEM_ALERT: Template = Template {
    kind: NotificationKind::Warning,
    category: NotificationCategory::System,
    priority: NotificationPriority::High,
    title: "Alerta do sistema",
    message: "{{message}}",
    auto_close: None,
    persistent: true,
    action_url: None,
};

const USER_LOGIN: Template = Template {
    kind: NotificationKind::Info,
    category: NotificationCategory::Users,
    priority: NotificationPriority::Low,
    title: "Novo acesso",
    message: "{{name}} entrou no sistema.",
    auto_close: Some(3000),
    persistent: false,
    action_url: None,
};

/// Values substituted into `{{name}}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateVars(BTreeMap<String, String>);

impl TemplateVars {
    /// No variables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Display) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Variables as a JSON object, attached to the notification.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        if self.0.is_empty() {
            return None;
        }
        serde_json::to_value(&self.0).ok()
    }
}

/// Substitute `{{name}}` placeholders. Unknown names become empty; an
/// unterminated `{{` is kept as-is.
#[must_use]
pub fn render(text: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let (before, after_open) = rest.split_at(open);
        out.push_str(before);
        let after_open = after_open.get(2..).unwrap_or_default();

        let Some(close) = after_open.find("}}") else {
            out.push_str("{{");
            out.push_str(after_open);
            return out;
        };
        let (name, after_name) = after_open.split_at(close);
        out.push_str(vars.get(name.trim()).unwrap_or_default());
        rest = after_name.get(2..).unwrap_or_default();
    }

    out.push_str(rest);
    out
}
