mod coerce;
pub mod service;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use service::ResourceService;

/// How a filter key's raw value is coerced before it reaches `$match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Stored as ObjectId; strings are parsed.
    Id,
    /// Stored as BSON datetime; strings/millis are parsed.
    Date,
    /// Passed through as-is.
    Value,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FilterField {
    pub const fn id(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Id }
    }

    pub const fn date(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Date }
    }

    pub const fn value(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Value }
    }
}

/// Per-resource defaults the list-query engine is instantiated with.
#[derive(Debug)]
pub struct ResourceSchema {
    pub name: &'static str,
    pub collection: &'static str,
    /// Fields matched case-insensitively by the free-text term.
    pub search_fields: &'static [&'static str],
    /// Projection used when the caller sends no `select`. A leading `-`
    /// marks an excluded field.
    pub default_select: &'static [&'static str],
    /// Never projected, whatever the caller asks for.
    pub secret_field: Option<&'static str>,
    pub filter_fields: &'static [FilterField],
    /// Date field whose month number is exposed as a derived `month` field.
    pub month_from: Option<&'static str>,
}

impl ResourceSchema {
    pub fn filter_field(&self, key: &str) -> Option<&FilterField> {
        self.filter_fields.iter().find(|f| f.name == key)
    }
}

macro_rules! resource_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum ResourceKind {
            $($variant),+
        }

        impl ResourceKind {
            pub const ALL: &'static [ResourceKind] = &[$(ResourceKind::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $name),+
                }
            }
        }

        impl FromStr for ResourceKind {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(ResourceKind::$variant),)+
                    other => Err(format!("Unknown resource `{other}`")),
                }
            }
        }
    };
}

resource_kinds! {
    Task => "task",
    Project => "project",
    User => "user",
    Invoice => "invoice",
    Payment => "payment",
    Expense => "expense",
    Income => "income",
    Bazaar => "bazaar",
    Standup => "standup",
    Admission => "admission",
    AdmissionTarget => "admission-target",
    Designation => "designation",
    Notification => "notification",
    Menu => "menu",
    Tag => "tag",
    UserType => "user-type",
    ProjectCategory => "project-category",
    Technology => "technology",
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const COMMON: [FilterField; 4] = [
    FilterField::id("_id"),
    FilterField::value("name"),
    FilterField::value("visibility"),
    FilterField::date("createdAt"),
];

const COMMON_FIELDS: &[FilterField] = &COMMON;

static TASK: ResourceSchema = ResourceSchema {
    name: "task",
    collection: "tasks",
    search_fields: &["title"],
    default_select: &["title"],
    secret_field: None,
    filter_fields: &[
        FilterField::id("_id"),
        FilterField::value("title"),
        FilterField::value("visibility"),
        FilterField::value("isDone"),
        FilterField::value("month"),
        FilterField::id("project._id"),
        FilterField::id("assignTo._id"),
        FilterField::id("assignBy._id"),
        FilterField::id("tag._id"),
        FilterField::date("assignDate"),
        FilterField::date("dueDate"),
        FilterField::value("assignDateString"),
        FilterField::value("dueDateString"),
        FilterField::date("createdAt"),
    ],
    month_from: Some("dueDate"),
};

static PROJECT: ResourceSchema = ResourceSchema {
    name: "project",
    collection: "projects",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[2],
        COMMON[3],
        FilterField::id("category._id"),
        FilterField::id("tag._id"),
        FilterField::id("technologies._id"),
        FilterField::value("status"),
        FilterField::value("source"),
        FilterField::value("country"),
        FilterField::date("startDate"),
        FilterField::date("deadline"),
    ],
    month_from: None,
};

static USER: ResourceSchema = ResourceSchema {
    name: "user",
    collection: "users",
    search_fields: &["username", "phoneNo"],
    default_select: &["-password"],
    secret_field: Some("password"),
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[3],
        FilterField::value("username"),
        FilterField::value("gender"),
        FilterField::value("hasAccess"),
        FilterField::value("role"),
        FilterField::id("designation._id"),
        FilterField::id("userType._id"),
        FilterField::id("technologies._id"),
        FilterField::date("joinDate"),
    ],
    month_from: None,
};

static INVOICE: ResourceSchema = ResourceSchema {
    name: "invoice",
    collection: "invoices",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[2],
        COMMON[3],
        FilterField::value("invoiceId"),
        FilterField::value("customerId"),
        FilterField::value("paymentStatus"),
        FilterField::value("status"),
        FilterField::value("month"),
        FilterField::value("dateString"),
        FilterField::date("date"),
        FilterField::id("project._id"),
        FilterField::id("generatedBy._id"),
    ],
    month_from: None,
};

static PAYMENT: ResourceSchema = ResourceSchema {
    name: "payment",
    collection: "payments",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[3],
        FilterField::value("month"),
        FilterField::date("date"),
        FilterField::id("user._id"),
        FilterField::id("createdBy._id"),
    ],
    month_from: None,
};

static EXPENSE: ResourceSchema = ResourceSchema {
    name: "expense",
    collection: "expenses",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[2],
        COMMON[3],
        FilterField::value("month"),
        FilterField::value("dateString"),
        FilterField::date("date"),
        FilterField::id("user._id"),
        FilterField::id("admin._id"),
        FilterField::id("category._id"),
    ],
    month_from: None,
};

static INCOME: ResourceSchema = ResourceSchema {
    name: "income",
    collection: "incomes",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[2],
        COMMON[3],
        FilterField::value("month"),
        FilterField::value("dateString"),
        FilterField::date("date"),
        FilterField::id("project._id"),
        FilterField::id("admin._id"),
    ],
    month_from: None,
};

static BAZAAR: ResourceSchema = ResourceSchema {
    name: "bazaar",
    collection: "bazaars",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[3],
        FilterField::value("month"),
        FilterField::date("date"),
        FilterField::id("createdBy._id"),
    ],
    month_from: None,
};

static STANDUP: ResourceSchema = ResourceSchema {
    name: "standup",
    collection: "standups",
    search_fields: &["name", "phoneNo"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[2],
        COMMON[3],
        FilterField::value("month"),
        FilterField::value("dateString"),
        FilterField::value("dateNum"),
        FilterField::value("isJoined"),
        FilterField::date("date"),
        FilterField::id("user._id"),
        FilterField::id("admin._id"),
    ],
    month_from: None,
};

static ADMISSION: ResourceSchema = ResourceSchema {
    name: "admission",
    collection: "admissions",
    search_fields: &["name", "phoneNo"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[2],
        COMMON[3],
        FilterField::value("month"),
        FilterField::value("dateString"),
        FilterField::date("date"),
        FilterField::id("project._id"),
        FilterField::id("user._id"),
    ],
    month_from: None,
};

static ADMISSION_TARGET: ResourceSchema = ResourceSchema {
    name: "admission-target",
    collection: "admission_targets",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[2],
        COMMON[3],
        FilterField::value("month"),
        FilterField::id("project._id"),
        FilterField::id("user._id"),
    ],
    month_from: None,
};

static DESIGNATION: ResourceSchema = simple_schema("designation", "designations");
static MENU: ResourceSchema = ResourceSchema {
    name: "menu",
    collection: "menus",
    search_fields: &["name"],
    default_select: &["name"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[1],
        COMMON[3],
        FilterField::date("date"),
        FilterField::id("createdBy._id"),
    ],
    month_from: None,
};
static NOTIFICATION: ResourceSchema = ResourceSchema {
    name: "notification",
    collection: "notifications",
    search_fields: &["title"],
    default_select: &["title"],
    secret_field: None,
    filter_fields: &[
        COMMON[0],
        COMMON[3],
        FilterField::value("title"),
        FilterField::value("groupBy"),
    ],
    month_from: None,
};
static TAG: ResourceSchema = simple_schema("tag", "tags");
static USER_TYPE: ResourceSchema = simple_schema("user-type", "user_types");
static PROJECT_CATEGORY: ResourceSchema = simple_schema("project-category", "project_categories");
static TECHNOLOGY: ResourceSchema = simple_schema("technology", "technologies");

const fn simple_schema(name: &'static str, collection: &'static str) -> ResourceSchema {
    ResourceSchema {
        name,
        collection,
        search_fields: &["name"],
        default_select: &["name"],
        secret_field: None,
        filter_fields: COMMON_FIELDS,
        month_from: None,
    }
}

impl ResourceKind {
    pub fn schema(self) -> &'static ResourceSchema {
        match self {
            ResourceKind::Task => &TASK,
            ResourceKind::Project => &PROJECT,
            ResourceKind::User => &USER,
            ResourceKind::Invoice => &INVOICE,
            ResourceKind::Payment => &PAYMENT,
            ResourceKind::Expense => &EXPENSE,
            ResourceKind::Income => &INCOME,
            ResourceKind::Bazaar => &BAZAAR,
            ResourceKind::Standup => &STANDUP,
            ResourceKind::Admission => &ADMISSION,
            ResourceKind::AdmissionTarget => &ADMISSION_TARGET,
            ResourceKind::Designation => &DESIGNATION,
            ResourceKind::Notification => &NOTIFICATION,
            ResourceKind::Menu => &MENU,
            ResourceKind::Tag => &TAG,
            ResourceKind::UserType => &USER_TYPE,
            ResourceKind::ProjectCategory => &PROJECT_CATEGORY,
            ResourceKind::Technology => &TECHNOLOGY,
        }
    }
}
