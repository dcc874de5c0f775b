//! Per-game endpoint metadata.
//!
//! Every game variant speaks the same AjaxPro protocol: a JSON POST whose
//! body differs only in the `Key`, a few game-specific fields, and
//! `PageIndex`, answered by a JSON envelope wrapping an HTML results table.
//! A game is therefore plain data consumed generically by the fetcher and
//! parser.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const ENDPOINT_PREFIX: &str = "https://vietlott.vn/ajaxpro/Vietlott.PlugIn.WebParts.";
const ENDPOINT_SUFFIX: &str = ",Vietlott.PlugIn.WebParts.ashx";

/// Name of the body field the fetcher overwrites per request.
pub const PAGE_INDEX_FIELD: &str = "PageIndex";

/// AjaxPro dispatches on this header rather than the URL.
pub const AJAX_METHOD_HEADER: &str = "x-ajaxpro-method";
pub const AJAX_METHOD: &str = "ServerSideDrawResult";

/// Browser user agent sent with every request.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const DEFAULT_INDEX_TO: u32 = 1;
const DEFAULT_NUM_THREADS: usize = 4;

/// Column positions of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableShape {
    pub date_col: usize,
    pub id_col: usize,
    pub result_col: usize,
}

impl TableShape {
    /// Cells a data row needs for every configured column to exist.
    pub fn min_columns(&self) -> usize {
        self.date_col.max(self.id_col).max(self.result_col) + 1
    }
}

impl Default for TableShape {
    fn default() -> Self {
        Self {
            date_col: 0,
            id_col: 1,
            result_col: 2,
        }
    }
}

/// Static description of one game endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GameDescriptor {
    /// Short name, also the dataset file stem (`<name>.jsonl`).
    pub name: String,
    pub url: String,
    /// AjaxPro `Key` body field.
    pub key: String,
    /// Game-specific body fields merged into the template.
    pub extra: Map<String, Value>,
    pub table: TableShape,
    /// Last page crawled when the caller gives no upper bound.
    pub default_index_to: u32,
    /// Worker count for the pagination pool.
    pub num_threads: usize,
}

impl GameDescriptor {
    /// A descriptor with the shared defaults and no game-specific fields.
    pub fn new(name: impl Into<String>, url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            key: key.into(),
            extra: Map::new(),
            table: TableShape::default(),
            default_index_to: DEFAULT_INDEX_TO,
            num_threads: DEFAULT_NUM_THREADS,
        }
    }

    /// Mega 6/55 and Power 6/55 share this web part.
    pub fn power_655() -> Self {
        let mut game = Self::new("power_655", endpoint("Game655"), "23bbd666");
        let array_numbers = vec![vec![Value::String(String::new()); 18]; 5];
        game.extra.insert("ArrayNumbers".into(), json!(array_numbers));
        game
    }

    pub fn max3d() -> Self {
        let mut game = Self::new("max3d", endpoint("GameMax3D"), "7d861b56");
        game.extra.insert("number01".into(), json!(0));
        game.extra.insert("number02".into(), json!(0));
        game
    }

    /// The full request body with `PageIndex = 0`.
    ///
    /// Build it once per crawl and patch clones with [`with_page_index`].
    pub fn request_template(&self) -> Value {
        let mut body = Map::new();
        body.insert("ORenderInfo".into(), render_info());
        body.insert("Key".into(), Value::String(self.key.clone()));
        body.insert("GameDrawId".into(), Value::String(String::new()));
        for (k, v) in &self.extra {
            body.insert(k.clone(), v.clone());
        }
        body.insert("CheckMulti".into(), Value::Bool(false));
        body.insert(PAGE_INDEX_FIELD.into(), json!(0));
        Value::Object(body)
    }

    /// The request body for one page.
    pub fn request_body(&self, page_index: u32) -> Value {
        with_page_index(&self.request_template(), page_index)
    }

    /// Dataset file name for this game.
    pub fn dataset_file_name(&self) -> String {
        format!("{}.jsonl", self.name)
    }
}

/// Clone `template` with its page index overwritten.
pub fn with_page_index(template: &Value, page_index: u32) -> Value {
    let mut body = template.clone();
    if let Value::Object(map) = &mut body {
        map.insert(PAGE_INDEX_FIELD.into(), json!(page_index));
    }
    body
}

/// Games known without any configuration.
pub fn builtin_games() -> Vec<GameDescriptor> {
    vec![GameDescriptor::power_655(), GameDescriptor::max3d()]
}

/// Look up a built-in game by name.
pub fn find_builtin(name: &str) -> Option<GameDescriptor> {
    builtin_games().into_iter().find(|g| g.name == name)
}

/// Endpoint URL for a `<web_part>CompareWebPart` handler.
pub fn endpoint(web_part: &str) -> String {
    format!("{ENDPOINT_PREFIX}{web_part}CompareWebPart{ENDPOINT_SUFFIX}")
}

fn render_info() -> Value {
    json!({
        "SiteId": "main.frontend.vi",
        "SiteAlias": "main.vi",
        "UserSessionId": "",
        "SiteLang": "en",
        "IsPageDesign": false,
        "ExtraParam1": "",
        "ExtraParam2": "",
        "ExtraParam3": "",
        "SiteURL": "",
        "WebPage": null,
        "SiteName": "Vietlott",
        "OrgPageAlias": null,
        "PageAlias": null,
        "RefKey": null,
        "FullPageAlias": null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_655_template_has_expected_fields() {
        let body = GameDescriptor::power_655().request_template();
        assert_eq!(body["Key"], "23bbd666");
        assert_eq!(body["GameDrawId"], "");
        assert_eq!(body["CheckMulti"], false);
        assert_eq!(body["PageIndex"], 0);
        assert_eq!(body["ORenderInfo"]["SiteId"], "main.frontend.vi");
        let rows = body["ArrayNumbers"].as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].as_array().unwrap().len(), 18);
    }

    #[test]
    fn max3d_uses_its_own_web_part() {
        let game = GameDescriptor::max3d();
        assert!(game.url.contains("GameMax3DCompareWebPart"));
        let body = game.request_template();
        assert_eq!(body["Key"], "7d861b56");
        assert_eq!(body["number01"], 0);
        assert!(body.get("ArrayNumbers").is_none());
    }

    #[test]
    fn page_index_patch_leaves_template_untouched() {
        let template = GameDescriptor::power_655().request_template();
        let body = with_page_index(&template, 7);
        assert_eq!(body["PageIndex"], 7);
        assert_eq!(template["PageIndex"], 0);
        assert_eq!(body["Key"], template["Key"]);
        assert_eq!(GameDescriptor::power_655().request_body(7), body);
    }

    #[test]
    fn table_shape_min_columns() {
        assert_eq!(TableShape::default().min_columns(), 3);
        let shape = TableShape {
            date_col: 4,
            id_col: 0,
            result_col: 2,
        };
        assert_eq!(shape.min_columns(), 5);
    }

    #[test]
    fn builtin_lookup() {
        assert!(find_builtin("power_655").is_some());
        assert!(find_builtin("max3d").is_some());
        assert!(find_builtin("keno").is_none());
        assert_eq!(GameDescriptor::max3d().dataset_file_name(), "max3d.jsonl");
    }
}
