//! This client fetches timetables from a WebUntis server over its JSON-RPC interface.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::header::{COOKIE, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    config::UntisConfig,
    error::{FeedError, FeedResult},
    lesson::{CellState, RawLesson, TeacherId},
    names::TeacherDirectory,
    source::{BoxFuture, LessonSource, TimetableTarget},
    window::DateWindow,
};

static RPC_PATH: &str = "/WebUntis/jsonrpc.do";
static RPC_ID: &str = "untis-ics";
static SUBJECT_FALLBACK: &str = "Lesson";
static ELEMENT_FIELDS: [&str; 3] = ["id", "name", "longname"];

/// Element type of a class in timetable requests.
const ELEMENT_TYPE_CLASS: u8 = 1;

/// A client for one WebUntis school.
#[derive(Debug, Clone)]
pub struct WebUntisClient {
    http: reqwest::Client,
    url: String,
    config: UntisConfig,
}

impl WebUntisClient {
    pub fn new(config: UntisConfig) -> Self {
        let url = if config.server.starts_with("http://") || config.server.starts_with("https://") {
            format!("{}{RPC_PATH}", config.server.trim_end_matches('/'))
        } else {
            format!("https://{}{RPC_PATH}", config.server.trim_end_matches('/'))
        };
        Self {
            http: reqwest::Client::new(),
            url,
            config,
        }
    }

    /// Log in and open a session.
    pub async fn login(&self) -> FeedResult<Session> {
        let mut session = Session {
            http: self.http.clone(),
            url: self.url.clone(),
            school: self.config.school.clone(),
            user_agent: self.config.user_agent.clone(),
            session_id: None,
            person: None,
        };
        let auth: AuthResult = session
            .call(
                "authenticate",
                json!({
                    "user": self.config.username,
                    "password": self.config.password,
                    "client": self.config.user_agent,
                }),
            )
            .await?;
        debug!(
            person_type = ?auth.person_type,
            person_id = ?auth.person_id,
            "logged in to WebUntis"
        );
        session.session_id = Some(auth.session_id);
        session.person = match (auth.person_type, auth.person_id) {
            (Some(r#type), Some(id)) if id > 0 => Some(Element { id, r#type }),
            _ => None,
        };
        Ok(session)
    }
}

/// An authenticated WebUntis session.
#[derive(Debug)]
pub struct Session {
    http: reqwest::Client,
    url: String,
    school: String,
    user_agent: String,
    session_id: Option<String>,
    person: Option<Element>,
}

impl Session {
    /// End the session. Failing to do so only leaves the session to expire on the server.
    pub async fn logout(self) {
        if let Err(err) = self.call::<()>("logout", json!({})).await {
            warn!(error = %err, "WebUntis logout failed");
        }
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> FeedResult<R> {
        let mut request = self
            .http
            .post(&self.url)
            .query(&[("school", self.school.as_str())])
            .header(USER_AGENT, &self.user_agent)
            .json(&RpcRequest {
                id: RPC_ID,
                method,
                params,
                jsonrpc: "2.0",
            });
        if let Some(session_id) = &self.session_id {
            request = request.header(COOKIE, format!("JSESSIONID={session_id}"));
        }
        let response: RpcResponse = request.send().await?.error_for_status()?.json().await?;
        response.into_result(method)
    }

    async fn timetable(&self, element: Element, window: DateWindow) -> FeedResult<Vec<RawLesson>> {
        let Some(params) = timetable_params(element, &window) else {
            return Ok(Vec::new());
        };
        let periods: Vec<Period> = self.call("getTimetable", params).await?;
        debug!(count = periods.len(), element = ?element, "fetched periods");
        Ok(periods
            .into_iter()
            .filter_map(Period::into_raw_lesson)
            .collect())
    }

    async fn class_element(&self, name: &str) -> FeedResult<Element> {
        let classes: Vec<Class> = self.call("getKlassen", json!({})).await?;
        classes
            .into_iter()
            .find(|class| class.name == name)
            .map(|class| Element {
                id: class.id,
                r#type: ELEMENT_TYPE_CLASS,
            })
            .ok_or_else(|| FeedError::ClassNotFound(String::from(name)))
    }

    async fn teachers(&self) -> FeedResult<TeacherDirectory> {
        let teachers: Vec<Teacher> = self.call("getTeachers", json!({})).await?;
        Ok(teachers
            .into_iter()
            .map(|teacher| {
                let name = teacher.display_name();
                (teacher.id, name)
            })
            .collect())
    }
}

impl LessonSource for Session {
    fn fetch(
        &self,
        target: TimetableTarget,
        window: DateWindow,
    ) -> BoxFuture<'_, FeedResult<Vec<RawLesson>>> {
        Box::pin(async move {
            let element = match &target {
                TimetableTarget::Mine => self.person.ok_or_else(|| FeedError::Rpc {
                    method: String::from("getTimetable"),
                    code: 0,
                    message: String::from("the account is not linked to a person"),
                })?,
                TimetableTarget::Class(name) => self.class_element(name).await?,
            };
            self.timetable(element, window).await
        })
    }

    fn fetch_rights_directory(&self) -> BoxFuture<'_, Option<TeacherDirectory>> {
        Box::pin(async move {
            match self.teachers().await {
                Ok(directory) => Some(directory),
                Err(err) => {
                    debug!(error = %err, "teacher list unavailable");
                    None
                }
            }
        })
    }
}

/// A timetable element: a person, a class, a room...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct Element {
    id: u64,
    r#type: u8,
}

/// Parameters of a `getTimetable` request, `None` for an empty window.
///
/// WebUntis treats the end date as inclusive.
fn timetable_params(element: Element, window: &DateWindow) -> Option<serde_json::Value> {
    let last_day = window.last_day()?;
    Some(json!({
        "options": {
            "element": element,
            "startDate": untis_date(window.start()),
            "endDate": untis_date(last_day),
            "showInfo": true,
            "showSubstText": true,
            "subjectFields": ELEMENT_FIELDS,
            "roomFields": ELEMENT_FIELDS,
            "teacherFields": ELEMENT_FIELDS,
            "klasseFields": ELEMENT_FIELDS,
        }
    }))
}

fn untis_date(date: NaiveDate) -> i32 {
    date.year() * 10000 + (date.month() * 100 + date.day()) as i32
}

fn parse_untis_date(date: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((date / 10000) as i32, date / 100 % 100, date % 100)
}

fn parse_untis_time(time: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(time / 100, time % 100, 0)
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: &'a str,
    method: &'a str,
    params: serde_json::Value,
    jsonrpc: &'a str,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_result<R: DeserializeOwned>(self, method: &str) -> FeedResult<R> {
        if let Some(error) = self.error {
            return Err(FeedError::Rpc {
                method: String::from(method),
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(self.result).map_err(|err| FeedError::Rpc {
            method: String::from(method),
            code: 0,
            message: format!("unexpected response: {err}"),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResult {
    session_id: String,
    person_type: Option<u8>,
    person_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Class {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Teacher {
    id: TeacherId,
    name: String,
    #[serde(default)]
    fore_name: String,
    #[serde(default)]
    long_name: String,
}

impl Teacher {
    fn display_name(&self) -> String {
        match (self.fore_name.is_empty(), self.long_name.is_empty()) {
            (false, false) => format!("{} {}", self.fore_name, self.long_name),
            (true, false) => self.long_name.clone(),
            _ => self.name.clone(),
        }
    }
}

/// A reference to an element inside a period.
#[derive(Debug, Deserialize)]
struct ElementRef {
    id: Option<u64>,
    name: Option<String>,
    longname: Option<String>,
}

impl ElementRef {
    fn label(&self) -> Option<&str> {
        self.longname
            .as_deref()
            .or(self.name.as_deref())
            .filter(|label| !label.is_empty())
    }
}

/// A period as returned by `getTimetable`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Period {
    id: Option<u64>,
    date: u32,
    start_time: u32,
    end_time: u32,
    #[serde(default)]
    su: Vec<ElementRef>,
    #[serde(default)]
    ro: Vec<ElementRef>,
    #[serde(default)]
    te: Vec<ElementRef>,
    code: Option<String>,
    cell_state: Option<CellState>,
}

impl Period {
    fn into_raw_lesson(self) -> Option<RawLesson> {
        let date = parse_untis_date(self.date);
        let (Some(date), Some(start), Some(end)) = (
            date,
            parse_untis_time(self.start_time),
            parse_untis_time(self.end_time),
        ) else {
            debug!(id = ?self.id, date = self.date, "period with invalid date or time");
            return None;
        };
        let subject = join_labels(&self.su).unwrap_or_else(|| String::from(SUBJECT_FALLBACK));
        let mut lesson = RawLesson::new(
            subject,
            NaiveDateTime::new(date, start),
            NaiveDateTime::new(date, end),
        )
        .with_teachers(self.te.iter().filter_map(|teacher| teacher.id).collect());
        lesson.teacher_labels = self
            .te
            .iter()
            .filter_map(|teacher| Some((teacher.id?, String::from(teacher.label()?))))
            .collect();
        lesson.id = self.id;
        lesson.room = join_labels(&self.ro);
        lesson.code = self.code;
        lesson.cell_state = self.cell_state;
        Some(lesson)
    }
}

fn join_labels(elements: &[ElementRef]) -> Option<String> {
    let labels: Vec<&str> = elements.iter().filter_map(ElementRef::label).collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{NaiveDate, NaiveDateTime};

    use crate::{
        error::FeedError,
        lesson::{CellState, LessonStatus, RawLesson},
        names::{NameResolver, TeacherDirectory},
        reconcile::Reconciler,
        source::ClassTimetable,
        webuntis::{timetable_params, Element, Period, RpcResponse, Teacher},
        window::DateWindow,
    };

    fn fixture_lessons() -> Vec<RawLesson> {
        let json = include_str!("webuntis/tests/timetable.json");
        let response: RpcResponse = serde_json::from_str(json).unwrap();
        response
            .into_result::<Vec<Period>>("getTimetable")
            .unwrap()
            .into_iter()
            .filter_map(Period::into_raw_lesson)
            .collect()
    }

    /// Test whether a timetable response is turned into raw lessons.
    ///
    /// This test is offline.
    #[test]
    fn test_parse_timetable() {
        let lessons = fixture_lessons();
        assert_eq!(lessons.len(), 4);

        let maths = &lessons[0];
        assert_eq!(maths.id, Some(125043));
        assert_eq!(maths.subject, "Mathematik");
        assert_eq!(
            maths.start,
            NaiveDateTime::from_str("2024-01-02T08:00:00").unwrap()
        );
        assert_eq!(
            maths.end,
            NaiveDateTime::from_str("2024-01-02T08:45:00").unwrap()
        );
        assert_eq!(maths.room.as_deref(), Some("R101"));
        assert_eq!(maths.teachers, vec![3]);
        assert_eq!(maths.status(), LessonStatus::Held);

        let english = &lessons[1];
        assert_eq!(english.code.as_deref(), Some("cancelled"));
        assert_eq!(english.status(), LessonStatus::Cancelled);
        assert_eq!(english.teachers, vec![7, 12]);

        let art = &lessons[2];
        assert_eq!(art.subject, "Lesson");
        assert_eq!(art.room, None);
        assert_eq!(art.id, None);
        assert_eq!(art.status(), LessonStatus::Substituted);
        assert_eq!(art.teacher_labels.get(9), Some("Müller"));

        let sports = &lessons[3];
        assert_eq!(sports.cell_state, Some(CellState::Name(String::from("CANCEL"))));
        assert_eq!(sports.status(), LessonStatus::Cancelled);
    }

    /// Without the right to list teachers, the names sent with the periods are used.
    #[test]
    fn test_teacher_names_from_timetable() {
        let window = DateWindow::new(
            NaiveDate::from_str("2024-01-01").unwrap(),
            NaiveDate::from_str("2024-01-08").unwrap(),
        )
        .unwrap();
        let reconciler = Reconciler::new(NameResolver::new(TeacherDirectory::new()));
        let reconciled =
            reconciler.reconcile(&window, fixture_lessons(), ClassTimetable::Unavailable, None);
        let names: Vec<Vec<String>> = reconciled
            .into_iter()
            .map(|lesson| lesson.teacher_names)
            .collect();
        assert_eq!(
            names,
            vec![
                vec![String::from("Smith")],
                vec![String::from("7"), String::from("ADA")],
                vec![String::from("Müller")],
                vec![String::from("41")],
            ]
        );
    }

    #[test]
    fn test_rpc_error() {
        let json = r#"{"jsonrpc":"2.0","id":"untis-ics","error":{"code":-8509,"message":"no right for getTeachers()"}}"#;
        let response: RpcResponse = serde_json::from_str(json).unwrap();
        let result = response.into_result::<Vec<Teacher>>("getTeachers");
        assert!(matches!(result, Err(FeedError::Rpc { code: -8509, .. })));
    }

    #[test]
    fn test_teacher_display_name() {
        let json = r#"[
            {"id": 3, "name": "SMI", "foreName": "J.", "longName": "Smith"},
            {"id": 4, "name": "ADA", "foreName": "", "longName": "Adams"},
            {"id": 5, "name": "XYZ"}
        ]"#;
        let teachers: Vec<Teacher> = serde_json::from_str(json).unwrap();
        let names: Vec<String> = teachers.iter().map(Teacher::display_name).collect();
        assert_eq!(names, vec!["J. Smith", "Adams", "XYZ"]);
    }

    #[test]
    fn test_timetable_params_use_inclusive_end() {
        let window = DateWindow::new(
            NaiveDate::from_str("2024-01-01").unwrap(),
            NaiveDate::from_str("2024-01-08").unwrap(),
        )
        .unwrap();
        let params = timetable_params(Element { id: 42, r#type: 5 }, &window).unwrap();
        assert_eq!(params["options"]["startDate"], 20240101);
        assert_eq!(params["options"]["endDate"], 20240107);
        assert_eq!(params["options"]["element"]["id"], 42);
        assert_eq!(params["options"]["element"]["type"], 5);

        let empty = DateWindow::new(
            NaiveDate::from_str("2024-01-01").unwrap(),
            NaiveDate::from_str("2024-01-01").unwrap(),
        )
        .unwrap();
        assert!(timetable_params(Element { id: 42, r#type: 5 }, &empty).is_none());
    }
}
