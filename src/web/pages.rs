//! Landing page template using maud.

use maud::{html, Markup, PreEscaped, DOCTYPE};

const PAGE_CSS: &str = r#"
body {
    max-width: 640px;
    margin: 3rem auto;
    padding: 0 1rem;
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
    line-height: 1.6;
    color: #333;
}
h1 { margin-bottom: 0.25rem; }
.tagline { color: #666; margin-top: 0; }
form { margin: 2rem 0; }
input[type="url"], input[type="number"] {
    width: 100%;
    padding: 0.5rem;
    margin: 0.25rem 0 1rem;
    font-size: 1rem;
    box-sizing: border-box;
}
label.format { margin-right: 1rem; }
button {
    padding: 0.5rem 1.5rem;
    font-size: 1rem;
    cursor: pointer;
}
#status { margin-top: 1.5rem; color: #555; }
#status a { color: #0066cc; }
.error { color: #b00020; }
"#;

const PAGE_JS: &str = r#"
const form = document.getElementById('pack-form');
const status = document.getElementById('status');
let pollTimer = null;

form.addEventListener('submit', async (event) => {
    event.preventDefault();
    clearInterval(pollTimer);
    status.textContent = 'Submitting...';
    status.classList.remove('error');

    const formats = Array.from(form.querySelectorAll('input[name="format"]:checked'))
        .map((box) => box.value);
    const body = {
        url: form.url.value,
        formats: formats,
        max_posts: parseInt(form.max_posts.value, 10) || 100,
    };

    const response = await fetch('/process', {
        method: 'POST',
        headers: {'Content-Type': 'application/json'},
        body: JSON.stringify(body),
    });
    const data = await response.json();
    if (!response.ok) {
        status.textContent = data.detail || 'Submission failed';
        status.classList.add('error');
        return;
    }

    const jobId = data.job_id;
    pollTimer = setInterval(async () => {
        const res = await fetch('/status/' + jobId);
        if (!res.ok) { return; }
        const job = await res.json();
        if (job.status === 'queued') {
            status.textContent = 'Queued (position ' + job.queue_position +
                ' of ' + job.queue_total + ')';
        } else if (job.status === 'processing') {
            status.textContent = job.progress || 'Processing...';
        } else if (job.status === 'complete') {
            clearInterval(pollTimer);
            status.innerHTML = 'Done! <a href="/download/' + jobId +
                '">Download your blog pack</a> (one-time link)';
        } else if (job.status === 'error') {
            clearInterval(pollTimer);
            status.textContent = 'Failed: ' + (job.error || 'unknown error');
            status.classList.add('error');
        }
    }, 2000);
});
"#;

/// Render the landing page.
#[must_use]
pub fn render_index(max_posts: usize) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Blogpack" }
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                h1 { "Blogpack" }
                p class="tagline" { "Pack a blog for offline reading." }
                form id="pack-form" {
                    label for="url" { "Blog URL" }
                    input type="url" name="url" id="url"
                        placeholder="https://example.substack.com" required;

                    fieldset style="border:none;padding:0;" {
                        label class="format" {
                            input type="checkbox" name="format" value="html" checked;
                            " HTML"
                        }
                        label class="format" {
                            input type="checkbox" name="format" value="epub" checked;
                            " EPUB"
                        }
                        label class="format" {
                            input type="checkbox" name="format" value="pdf" checked;
                            " PDF"
                        }
                    }

                    label for="max_posts" { "Max posts (up to " (max_posts) ")" }
                    input type="number" name="max_posts" id="max_posts"
                        value=(max_posts) min="1" max=(max_posts);

                    button type="submit" { "Pack it" }
                }
                div id="status" {}
                script { (PreEscaped(PAGE_JS)) }
            }
        }
    }
}
