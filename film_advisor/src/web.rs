//! Server-rendered HTML for the demo, catalog management and labeler pages.

use crate::{catalog::Product, routes::predict::Analysis};
use axum::response::Html;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::{collections::BTreeMap, fmt::Write};
use surface_model::{Finish, Material};

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; color: #222; }
nav { background: #1f3a5f; padding: 0.8em 1.5em; }
nav a { color: #fff; margin-right: 1.5em; text-decoration: none; font-weight: bold; }
main { padding: 1.5em; max-width: 1100px; }
.columns { display: flex; gap: 2em; flex-wrap: wrap; }
.columns > section { flex: 1; min-width: 320px; }
.notice { padding: 0.6em 1em; border-radius: 4px; margin-bottom: 1em; }
.success { background: #e3f5e1; border: 1px solid #7bc47f; }
.error { background: #fbe3e3; border: 1px solid #d77; }
.warning { background: #fff6dd; border: 1px solid #e0b84d; }
.bar { background: #eee; border-radius: 4px; height: 14px; margin-bottom: 0.8em; }
.bar > div { background: #2f80ed; height: 14px; border-radius: 4px; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 0.3em 0.6em; text-align: left; vertical-align: top; }
img.preview { max-width: 100%; border: 1px solid #ccc; }
fieldset { margin-bottom: 1em; }
label { display: block; margin: 0.3em 0; }
"#;

pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    fn render(&self) -> String {
        match self {
            Notice::Success(message) => {
                format!("<div class=\"notice success\">{}</div>", escape(message))
            }
            Notice::Error(message) => {
                format!("<div class=\"notice error\">{}</div>", escape(message))
            }
        }
    }
}

/// An analyzed upload as shown on the demo page.
pub struct DemoResult<'a> {
    pub image_data: &'a [u8],
    pub analysis: &'a Analysis,
    /// Whether the top recommendation has an image the server will serve.
    pub best_has_image: bool,
}

/// Runtime facts shown in the demo page's debug panel.
pub struct DebugInfo<'a> {
    pub mode: &'a str,
    pub weights_path: &'a str,
    pub catalog_path: &'a str,
    pub catalog_size: Option<usize>,
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} | Surface Film Advisor</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <nav><a href=\"/\">User Demo</a><a href=\"/admin\">DB Management</a>\
         <a href=\"/labeler\">Data Labeler</a></nav>\n<main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape(title),
    ))
}

fn upload_form() -> &'static str {
    "<form action=\"/demo\" method=\"post\" enctype=\"multipart/form-data\">\
     <fieldset><legend>Upload Product Image</legend>\
     <input type=\"file\" name=\"image\" accept=\".jpg,.jpeg,.png\" required> \
     <button type=\"submit\">Analyze</button>\
     <p>Tip: try uploading images of metal or plastic surfaces.</p>\
     </fieldset></form>"
}

fn debug_panel(info: &DebugInfo) -> String {
    let catalog = match info.catalog_size {
        Some(size) => format!("{} ({} products)", escape(info.catalog_path), size),
        None => format!("{} (unreadable)", escape(info.catalog_path)),
    };
    format!(
        "<details><summary>Show Debug Info</summary><ul>\
         <li>System Status: Online</li>\
         <li>Classifier mode: {}</li>\
         <li>Model: ResNet-18 backbone, dual head ({} materials, {} finishes)</li>\
         <li>Weights: {}</li>\
         <li>Database: {}</li></ul></details>",
        escape(info.mode),
        Material::COUNT,
        Finish::COUNT,
        escape(info.weights_path),
        catalog,
    )
}

fn confidence_bar(label: &str, value: &str, confidence: f32) -> String {
    let percent = (confidence * 100.0).clamp(0.0, 100.0);
    format!(
        "<p><strong>{}:</strong> {} ({:.1}%)</p>\
         <div class=\"bar\"><div style=\"width: {:.1}%\"></div></div>",
        escape(label),
        escape(value),
        percent,
        percent,
    )
}

fn data_url(data: &[u8]) -> String {
    let mime = image::guess_format(data)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

fn product_card(product: &Product, exact_match: bool, has_image: bool) -> String {
    let mut html = String::new();
    let heading = if exact_match {
        "Best Match"
    } else {
        "Generic Recommendation"
    };
    let _ = write!(html, "<h3>{}: {}</h3>", heading, escape(&product.name));
    if !exact_match {
        html.push_str(
            "<div class=\"notice warning\">No product targets this exact surface; \
             showing the default catalog entry.</div>",
        );
    }

    if has_image {
        let _ = write!(
            html,
            "<img class=\"preview\" style=\"max-width: 200px\" \
             src=\"/products/{}/image\" alt=\"{}\">",
            escape(&product.id),
            escape(&product.name)
        );
    } else {
        html.push_str("<p><em>Easy-to-peel Protection</em></p>");
    }

    let _ = write!(
        html,
        "<p><strong>Description:</strong> {}</p><h4>Specs</h4><table>",
        escape(&product.description)
    );
    for (key, value) in &product.specs {
        let _ = write!(html, "<tr><th>{}</th><td>{}</td></tr>", escape(key), escape(value));
    }
    html.push_str("</table>");
    html
}

pub fn demo_page(
    info: &DebugInfo,
    result: Option<&DemoResult>,
    notice: Option<&Notice>,
) -> Html<String> {
    let mut body = String::from(
        "<h1>Surface Film Advisor</h1>\
         <p><strong>Visual-based Surface Analysis &amp; Matching System</strong></p>",
    );
    if let Some(notice) = notice {
        body.push_str(&notice.render());
    }
    body.push_str(upload_form());
    body.push_str(&debug_panel(info));

    match result {
        Some(result) => {
            let analysis = result.analysis;
            let prediction = &analysis.prediction;
            let _ = write!(
                body,
                "<div class=\"columns\"><section><h2>1. Image Acquisition</h2>\
                 <img class=\"preview\" src=\"{}\" alt=\"Preprocessed Input\"></section>\
                 <section><h2>2. AI Analysis Result</h2>\
                 <div class=\"notice success\">Analysis Complete</div>{}{}</section></div>",
                data_url(result.image_data),
                confidence_bar(
                    "Detected Material",
                    prediction.material.as_str(),
                    prediction.material_confidence
                ),
                confidence_bar(
                    "Detected Finish",
                    prediction.finish.as_str(),
                    prediction.finish_confidence
                ),
            );

            body.push_str("<h2>3. Intelligent Recommendation</h2>");
            match analysis.recommendations.first() {
                Some(best) => body.push_str(&product_card(
                    best,
                    analysis.exact_match,
                    result.best_has_image,
                )),
                None => body.push_str(
                    "<div class=\"notice warning\">\
                     No perfect match found in current database.</div>",
                ),
            }
        }
        None => body.push_str(
            "<h2>Welcome</h2><p>This system analyzes surface properties to recommend \
             protective films.</p><ol><li><strong>Upload</strong> a photo of the surface.</li>\
             <li>The <strong>classifier</strong> identifies material type and surface finish.</li>\
             <li>The <strong>catalog</strong> supplies the best matching protective film.\
             </li></ol>",
        ),
    }

    layout("User Demo", &body)
}

fn join(values: &[String]) -> String {
    escape(&values.join(", "))
}

fn catalog_table(products: &[Product]) -> String {
    if products.is_empty() {
        return "<p>The catalog is empty.</p>".to_string();
    }

    let mut html = String::from(
        "<table><tr><th>ID</th><th>Name</th><th>Description</th><th>Specs</th>\
         <th>Materials</th><th>Finishes</th><th>Residue risk</th></tr>",
    );
    for product in products {
        let specs = product
            .specs
            .iter()
            .map(|(key, value)| format!("{}: {}", escape(key), escape(value)))
            .collect::<Vec<_>>()
            .join("<br>");
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&product.id),
            escape(&product.name),
            escape(&product.description),
            specs,
            join(&product.target_condition.material_category),
            join(&product.target_condition.finish_type),
            escape(&product.target_condition.risk_residue),
        );
    }
    html.push_str("</table>");
    html
}

fn checkboxes(name: &str, values: &[&str]) -> String {
    values
        .iter()
        .map(|value| {
            format!(
                "<label><input type=\"checkbox\" name=\"{}\" value=\"{}\"> {}</label>",
                name, value, value
            )
        })
        .collect()
}

fn radios(name: &str, values: &[&str]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            format!(
                "<label><input type=\"radio\" name=\"{}\" value=\"{}\"{}> {}</label>",
                name,
                value,
                if i == 0 { " checked" } else { "" },
                value
            )
        })
        .collect()
}

fn material_names() -> Vec<&'static str> {
    Material::ALL.iter().map(Material::as_str).collect()
}

fn finish_names() -> Vec<&'static str> {
    Finish::ALL.iter().map(Finish::as_str).collect()
}

pub fn admin_page(catalog: Result<&[Product], String>, notice: Option<&Notice>) -> Html<String> {
    let mut body = String::from("<h1>Database Management</h1>");
    if let Some(notice) = notice {
        body.push_str(&notice.render());
    }

    body.push_str("<h2>Current Database</h2>");
    match catalog {
        Ok(products) => body.push_str(&catalog_table(products)),
        Err(message) => body.push_str(&Notice::Error(message).render()),
    }

    let _ = write!(
        body,
        "<h2>Add New Product</h2>\
         <form action=\"/admin\" method=\"post\" enctype=\"multipart/form-data\">\
         <div class=\"columns\"><section>\
         <label>Product ID (e.g., PF-900) <input name=\"id\"></label>\
         <label>Product Name <input name=\"name\"></label>\
         <label>Base Material (e.g., PET, PE) <input name=\"base_material\"></label>\
         </section><section>\
         <label>Description <input name=\"description\"></label>\
         <label>Adhesive Type (e.g., Silicone) <input name=\"adhesive\"></label>\
         <label>Tack Force (e.g., 50 gf/25mm) <input name=\"tack_force\"></label>\
         </section></div>\
         <fieldset><legend>Target Materials</legend>{}</fieldset>\
         <fieldset><legend>Target Finishes</legend>{}</fieldset>\
         <button type=\"submit\">Save Product</button></form>",
        checkboxes("material_category", &material_names()),
        checkboxes("finish_type", &finish_names()),
    );

    layout("DB Management", &body)
}

pub fn labeler_page(
    counts: Result<&BTreeMap<String, usize>, String>,
    notice: Option<&Notice>,
) -> Html<String> {
    let mut body = String::from(
        "<h1>Data Labeler</h1><p>Upload images, pick their material and finish, \
         and they are filed into the matching training folder.</p>",
    );
    if let Some(notice) = notice {
        body.push_str(&notice.render());
    }

    body.push_str("<h2>Collected Images</h2>");
    match counts {
        Ok(counts) if counts.is_empty() => body.push_str("<p>No data collected yet.</p>"),
        Ok(counts) => {
            body.push_str("<table><tr><th>Class folder</th><th>Images</th></tr>");
            for (class, count) in counts {
                let _ = write!(body, "<tr><td>{}</td><td>{}</td></tr>", escape(class), count);
            }
            body.push_str("</table>");
        }
        Err(message) => body.push_str(&Notice::Error(message).render()),
    }

    let _ = write!(
        body,
        "<h2>Label and Save</h2>\
         <form action=\"/labeler\" method=\"post\" enctype=\"multipart/form-data\">\
         <fieldset><legend>1. Select Photos</legend>\
         <input type=\"file\" name=\"images\" accept=\".jpg,.jpeg,.png\" multiple required>\
         </fieldset>\
         <div class=\"columns\">\
         <section><fieldset><legend>Material</legend>{}</fieldset></section>\
         <section><fieldset><legend>Finish</legend>{}</fieldset></section></div>\
         <button type=\"submit\">Save all photos with these labels</button></form>",
        radios("material", &material_names()),
        radios("finish", &finish_names()),
    );

    layout("Data Labeler", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::product;
    use surface_model::Prediction;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape("PF-101"), "PF-101");
    }

    #[test]
    fn test_admin_page_escapes_catalog_content() {
        let mut item = product("PF-1", &["Metal"], &["Mirror"]);
        item.name = "<script>alert(1)</script>".to_string();

        let notice = Notice::Success("Saved".into());

        let Html(page) = admin_page(Ok(std::slice::from_ref(&item)), Some(&notice));

        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("Saved"));
        assert!(page.contains("value=\"Wood\""));
        assert!(page.contains("value=\"Pattern\""));
    }

    #[test]
    fn test_demo_page_marks_generic_recommendation() {
        let analysis = Analysis {
            prediction: Prediction::new(Material::Wood, 0.6, Finish::Pattern, 0.7),
            recommendations: vec![product("PF-1", &["Metal"], &["Mirror"])],
            exact_match: false,
        };
        let info = DebugInfo {
            mode: "mock",
            weights_path: "checkpoints/surface_classifier.mpk",
            catalog_path: "database.json",
            catalog_size: Some(1),
        };

        let result = DemoResult {
            image_data: b"not an image",
            analysis: &analysis,
            best_has_image: false,
        };

        let Html(page) = demo_page(&info, Some(&result), None);

        assert!(page.contains("Generic Recommendation: Film PF-1"));
        assert!(page.contains("Easy-to-peel Protection"));
        assert!(page.contains("Wood (60.0%)"));
        assert!(page.contains("data:application/octet-stream;base64,"));
    }

    #[test]
    fn test_demo_page_without_products() {
        let analysis = Analysis {
            prediction: Prediction::new(Material::Metal, 0.9, Finish::Mirror, 0.9),
            recommendations: Vec::new(),
            exact_match: false,
        };
        let info = DebugInfo {
            mode: "real",
            weights_path: "w.mpk",
            catalog_path: "database.json",
            catalog_size: Some(0),
        };

        let result = DemoResult {
            image_data: b"",
            analysis: &analysis,
            best_has_image: false,
        };

        let Html(page) = demo_page(&info, Some(&result), None);

        assert!(page.contains("No perfect match found in current database."));
    }

    #[test]
    fn test_labeler_page_lists_counts() {
        let counts = BTreeMap::from([("Metal_Mirror".to_string(), 3), ("junk".to_string(), 1)]);

        let Html(page) = labeler_page(Ok(&counts), None);

        assert!(page.contains("<td>Metal_Mirror</td><td>3</td>"));
        assert!(page.contains("<td>junk</td><td>1</td>"));
    }
}
