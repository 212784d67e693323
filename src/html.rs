use maud::{DOCTYPE, Markup, html};

use crate::endpoints;

// Link styles
pub const LINK_STYLE: &str = "panel-link";

// Page container
pub const PAGE_CONTAINER_STYLE: &str = "error-page";

/// The page layout shared by every full page.
pub fn base(title: &str, content: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en"
        {
            head
            {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " - Odoo Dashboard" }
                link href="/static/dashboard.css" rel="stylesheet";

                script src="https://unpkg.com/htmx.org@2.0.8/dist/htmx.min.js" {}
            }

            body class="dashboard"
            {
                (content)
            }
        }
    }
}

pub fn error_view(title: &str, header: &str, description: &str, fix: &str) -> Markup {
    let content = html!(
        section class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="error-code" { (header) }

            p class="error-description" { (description) }

            p class="error-fix" { (fix) }

            a href=(endpoints::DASHBOARD_VIEW) class=(LINK_STYLE)
            {
                "Back to Dashboard"
            }
        }
    );

    base(title, &content)
}
