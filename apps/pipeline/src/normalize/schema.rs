//! The unified resume schema and its completion step.
//!
//! Every field is always present after completion — empty string or empty
//! array when unknown — so consumers only ever branch on emptiness, never
//! on absence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnifiedResume {
    pub profile: Profile,
    pub work_experience: Vec<WorkExperience>,
    pub project_experience: Vec<ProjectExperience>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
    pub custom_sections: Vec<CustomSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub portfolio: String,
    pub linkedin: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    pub duration: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectExperience {
    pub name: String,
    pub role: String,
    pub duration: String,
    pub description: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub major: String,
    pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skill {
    pub category: String,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomSection {
    pub title: String,
    pub content: String,
}

/// Completes a parsed model object into a `UnifiedResume`.
///
/// Absent or wrong-typed fields become their zero value; unknown extra
/// fields are dropped without comment. Scalar numbers are stringified so a
/// bare `"phone": 5550100` survives.
pub fn complete(value: &Value) -> UnifiedResume {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    UnifiedResume {
        profile: profile_from(obj.get("profile")),
        work_experience: items_from(obj.get("workExperience"), work_from),
        project_experience: items_from(obj.get("projectExperience"), project_from),
        education: items_from(obj.get("education"), education_from),
        skills: items_from(obj.get("skills"), skill_from),
        custom_sections: items_from(obj.get("customSections"), section_from),
    }
}

fn profile_from(value: Option<&Value>) -> Profile {
    let empty = Map::new();
    let obj = value.and_then(Value::as_object).unwrap_or(&empty);
    Profile {
        name: text(obj, "name"),
        email: text(obj, "email"),
        phone: text(obj, "phone"),
        location: text(obj, "location"),
        portfolio: text(obj, "portfolio"),
        linkedin: text(obj, "linkedin"),
        summary: text(obj, "summary"),
    }
}

fn work_from(obj: &Map<String, Value>) -> WorkExperience {
    WorkExperience {
        company: text(obj, "company"),
        position: text(obj, "position"),
        duration: text(obj, "duration"),
        description: text(obj, "description"),
    }
}

fn project_from(obj: &Map<String, Value>) -> ProjectExperience {
    ProjectExperience {
        name: text(obj, "name"),
        role: text(obj, "role"),
        duration: text(obj, "duration"),
        description: text(obj, "description"),
        url: text(obj, "url"),
    }
}

fn education_from(obj: &Map<String, Value>) -> Education {
    Education {
        school: text(obj, "school"),
        degree: text(obj, "degree"),
        major: text(obj, "major"),
        duration: text(obj, "duration"),
    }
}

fn skill_from(obj: &Map<String, Value>) -> Skill {
    Skill {
        category: text(obj, "category"),
        details: text(obj, "details"),
    }
}

fn section_from(obj: &Map<String, Value>) -> CustomSection {
    CustomSection {
        title: text(obj, "title"),
        content: text(obj, "content"),
    }
}

fn items_from<T>(value: Option<&Value>, build: fn(&Map<String, Value>) -> T) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_object)
                .map(build)
                .collect()
        })
        .unwrap_or_default()
}

fn text(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
