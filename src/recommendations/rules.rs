use crate::metrics::MetricsBundle;
use crate::page::{PageFeatures, RouterMode};
use crate::scoring::ScoreResult;

use super::types::{Impact, Recommendation};

const LOW_SPEED_SCORE: u8 = 60;
const HEAVY_SCRIPT_COUNT: usize = 10;
const HEAVY_SCRIPT_BYTES: u64 = 500 * 1024;
const SLOW_PAINT_SECS: f64 = 2.5;
const VERY_SLOW_PAINT_SECS: f64 = 4.0;
const SHIFT_LIMIT: f64 = 0.1;
const SLOW_INTERACTION_MS: f64 = 200.0;
const SLOW_TTFB_MS: f64 = 600.0;
const UNOPTIMIZED_IMAGE_LIMIT: usize = 2;
const HEAVY_PAGE_BYTES: u64 = 1_000_000;

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    pub bundle: &'a MetricsBundle,
    pub scores: &'a ScoreResult,
    pub features: &'a PageFeatures,
}

impl RuleContext<'_> {
    fn low_speed(&self) -> bool {
        self.scores.speed < LOW_SPEED_SCORE
    }

    fn script_heavy(&self) -> bool {
        let resources = &self.bundle.resources;
        resources.script_count > HEAVY_SCRIPT_COUNT || resources.script_bytes > HEAVY_SCRIPT_BYTES
    }

    fn paint_secs(&self) -> f64 {
        self.bundle.paint_timing.value
    }
}

pub type Rule = fn(&RuleContext<'_>) -> Option<Recommendation>;

/// Evaluation order; ties in the final ordering keep this order.
pub const RULES: &[Rule] = &[
    reduce_bundle_size,
    render_on_server,
    optimize_data_fetching,
    enable_minifier,
    optimize_paint,
    optimize_fonts,
    reduce_layout_shifts,
    reduce_interaction_latency,
    improve_server_response,
    router_guidance,
    optimize_images,
    reduce_page_weight,
    review_metadata,
    validate_with_field_data,
];

fn reduce_bundle_size(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    if !(ctx.low_speed() && ctx.script_heavy()) {
        return None;
    }
    let resources = &ctx.bundle.resources;
    Some(Recommendation::technical(
        "Reduce JavaScript Bundle Size",
        format!(
            "Your page loads {} KB of JavaScript across {} resources.",
            resources.script_kb().round(),
            resources.script_count
        ),
        Impact::High,
        "Load below-the-fold and rarely used components with dynamic imports, lazy-load client \
         components, and check the build's code-splitting configuration.",
    ))
}

fn render_on_server(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    if !(ctx.low_speed() && ctx.script_heavy()) {
        return None;
    }
    Some(Recommendation::technical(
        "Move Non-Interactive Components to the Server",
        "Large JavaScript bundles indicate client-heavy rendering that server-rendered \
         components would avoid.",
        Impact::High,
        "Render components without interactivity on the server so they ship no client-side \
         JavaScript, and keep client boundaries as small as possible.",
    ))
}

fn optimize_data_fetching(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    if !ctx.low_speed() {
        return None;
    }
    Some(Recommendation::technical(
        "Optimize Data Fetching",
        "Improve performance with proper data fetching and caching strategies.",
        Impact::High,
        "Generate pages statically with periodic revalidation for content that changes rarely, \
         send explicit cache headers, and run mutations on the server.",
    ))
}

fn enable_minifier(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    if !(ctx.low_speed() && ctx.features.router == RouterMode::Pages) {
        return None;
    }
    Some(Recommendation::technical(
        "Enable the Built-in Minifier",
        "Make sure the framework's native compiler minifies production output.",
        Impact::Medium,
        "Turn on the compiler-based minifier in the framework configuration instead of the \
         slower JavaScript-based one.",
    ))
}

fn optimize_paint(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    if ctx.paint_secs() <= SLOW_PAINT_SECS {
        return None;
    }
    Some(Recommendation::technical(
        "Optimize Largest Contentful Paint",
        format!(
            "The largest content element renders after {:.1}s, which slows perceived loading.",
            ctx.paint_secs()
        ),
        Impact::High,
        "Mark hero images as priority, render above-the-fold content on the server, and preload \
         critical resources.",
    ))
}

fn optimize_fonts(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    if ctx.paint_secs() <= VERY_SLOW_PAINT_SECS {
        return None;
    }
    Some(Recommendation::technical(
        "Optimize Font Loading",
        "Very slow paint timing may be caused by render-blocking fonts.",
        Impact::Medium,
        "Self-host fonts through the framework's font loader with `display: swap` so text \
         renders before the font arrives.",
    ))
}

fn reduce_layout_shifts(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    if ctx.bundle.layout_stability.value <= SHIFT_LIMIT {
        return None;
    }
    Some(Recommendation::technical(
        "Reduce Layout Shifts",
        format!(
            "Content moves noticeably while the page loads (shift score {:.2}).",
            ctx.bundle.layout_stability.value
        ),
        Impact::Medium,
        "Give every image and embed explicit dimensions, reserve space for late content, and \
         size containers before data arrives.",
    ))
}

fn reduce_interaction_latency(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let sample = &ctx.bundle.interaction_latency;
    // A substituted default says nothing about this page's handlers.
    if !sample.is_measured() || sample.value <= SLOW_INTERACTION_MS {
        return None;
    }
    Some(Recommendation::technical(
        "Reduce Interaction Latency",
        format!(
            "Slow interactions take {:.0}ms before the page responds.",
            sample.value
        ),
        Impact::High,
        "Break up long tasks, defer non-urgent work out of event handlers, and avoid large \
         synchronous re-renders on input.",
    ))
}

fn improve_server_response(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let ttfb = ctx.bundle.time_to_first_byte_ms?;
    if ttfb <= SLOW_TTFB_MS {
        return None;
    }
    Some(Recommendation::technical(
        "Improve Server Response Time",
        format!("The first byte of the document arrives after {ttfb:.0}ms."),
        Impact::Medium,
        "Cache rendered pages at the edge, stream the response, and move slow data lookups off \
         the critical path.",
    ))
}

fn router_guidance(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    match ctx.features.router {
        RouterMode::Pages => Some(Recommendation::technical(
            "Upgrade to App Router",
            "You are using the older Pages Router.",
            Impact::Medium,
            "The App Router renders server components by default and simplifies routing; follow \
             the incremental migration guide route by route.",
        )),
        // An undetected router gets the App Router advice.
        RouterMode::App | RouterMode::Unknown => Some(Recommendation::technical(
            "Optimize App Router Usage",
            "Ensure your App Router implementation follows current guidance.",
            Impact::Medium,
            "Use parallel routes for complex layouts, intercepting routes for modals, and route \
             groups for organization without affecting URLs.",
        )),
    }
}

fn optimize_images(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let count = ctx.features.unoptimized_images;
    if count <= UNOPTIMIZED_IMAGE_LIMIT {
        return None;
    }
    Some(Recommendation::technical(
        "Use Image Optimization",
        format!("You have {count} images that bypass the framework's image optimization."),
        Impact::Medium,
        "Replace plain <img> tags with the framework's image component and allow-list external \
         image hosts in the configuration.",
    ))
}

fn reduce_page_weight(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let resources = &ctx.bundle.resources;
    if resources.total_bytes <= HEAVY_PAGE_BYTES {
        return None;
    }
    Some(Recommendation::technical(
        "Reduce Page Size",
        format!(
            "Your page loads {} KB of resources.",
            resources.total_kb().round()
        ),
        Impact::High,
        "Load below-the-fold components lazily with a placeholder and split code per route.",
    ))
}

fn review_metadata(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let features = ctx.features;
    Some(Recommendation::informational(
        "Review Page Metadata",
        format!(
            "Found {} meta tags, {} Open Graph tags and {} structured data blocks{}.",
            features.meta_tags,
            features.open_graph_tags,
            features.structured_data,
            match &features.language {
                Some(lang) => format!(" (language: {lang})"),
                None => ", and no document language".to_string(),
            }
        ),
        "Keep titles, descriptions, Open Graph tags and structured data accurate for every route, \
         and declare the document language.",
    ))
}

fn validate_with_field_data(_ctx: &RuleContext<'_>) -> Option<Recommendation> {
    Some(Recommendation::informational(
        "Validate With Field Data",
        "These numbers come from a single page visit and can differ from what real users \
         experience.",
        "Compare against field data from real-user monitoring before prioritizing work.",
    ))
}
