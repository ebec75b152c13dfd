use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;

use super::TreeMeta;
use crate::config::ExportSettings;
use crate::error::ExportError;
use crate::theme::Theme;
use crate::xml::{attr, escape_xml};

static SCRIPT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</script>").expect("script close regex"));

const DOCUMENT: &str = r##"<!doctype html>
<html lang="en">
<meta charset="utf-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>@TITLE@</title>
<style>
  html,body{margin:0;height:100%}
  body{background:@BACKGROUND@;color:@FOREGROUND@}
  body.dark{background:#111827;color:#f8fafc}
  .wrap{height:100vh}
  .wrap svg{width:100%;height:100%}
  .dark svg text, .dark svg tspan{fill:#f8fafc !important;opacity:.98 !important}
  .markmap-foreign, .markmap-foreign *{pointer-events:auto}
  .dark .markmap-foreign{color:#f8fafc !important}
  .dark .markmap-foreign *:not(.user1-node):not(.user2-node):not(.shared-node){color:inherit !important}
  .mm-badge.mm-rank{display:inline-block;border:1px solid rgba(0,0,0,.18);border-radius:4px;padding:0 4px;margin-left:.25rem;font-weight:600;line-height:1.2}
  .dark .mm-badge.mm-rank{color:#f8fafc !important;border-color:rgba(255,255,255,.35);background:rgba(255,255,255,.06)}
  .user1-node, .user1-node a, .user1-node *{color:#dc2626 !important}
  .user2-node, .user2-node a, .user2-node *{color:#2563eb !important}
  .shared-node, .shared-node a, .shared-node *{color:#9333ea !important}
  .seen-node, .seen-node a, .seen-node *{color:#22c55e !important}
  .unseen-node, .unseen-node a, .unseen-node *{color:#9ca3af !important}
  noscript img{display:block;max-width:100%;margin:0 auto}
</style>
<body@BODY_CLASS@>
<div class="wrap" id="wrap"><svg id="mm"></svg></div>
<noscript>@SNAPSHOT@</noscript>
<script @D3@></script>
<script @MARKMAP_LIB@></script>
<script @MARKMAP_VIEW@></script>
<script>
  const rawMd = @RAW_OUTLINE@;

  function stripPictureChips(md){
    return String(md)
      .replace(/<a\b[^>]*>\s*🖼️?\s*<\/a>/gi, '')
      .replace(/\[🖼️?\]\([^)]+\)/gi, '')
      .replace(/🖼️?/g, '');
  }

  function absolutizeHrefInMd(md){
    return String(md)
      .replace(/href=(["'])\s*\/\/([^"']+)\1/gi, 'href=$1https://$2$1')
      .replace(/href=(["'])\s*\/(observations|taxa|photos|people|posts)\b/gi,
               'href=$1https://www.inaturalist.org/$2')
      .replace(/href=(["'])\s*(observations|taxa|photos|people|posts)\b/gi,
               'href=$1https://www.inaturalist.org/$2');
  }

  const processedMd = absolutizeHrefInMd(
    stripPictureChips(String(rawMd))
      .replace(/\{color:red\}([\s\S]*?)\{\/color\}/gi, '<span class="user1-node">$1</span>')
      .replace(/\{color:blue\}([\s\S]*?)\{\/color\}/gi, '<span class="user2-node">$1</span>')
      .replace(/\{color:purple\}([\s\S]*?)\{\/color\}/gi, '<span class="shared-node">$1</span>')
      .replace(/\{color:#22c55e\}([\s\S]*?)\{\/color\}/gi, '<span class="seen-node">$1</span>')
      .replace(/\{color:#9ca3af\}([\s\S]*?)\{\/color\}/gi, '<span class="unseen-node">$1</span>')
  );

  const { Transformer, Markmap } = window.markmap;
  const root = new Transformer().transform(processedMd).root;

  (function injectRankBadges(node){
    const visit = (n)=>{
      if (n.content){
        const m = n.content.match(/\{rank:([a-z_-]+)\}/i);
        if (m){
          const rank = m[1].toLowerCase();
          const letter = rank.charAt(0).toUpperCase();
          n.content = n.content.replace(/\s*\{rank:[^}]+\}\s*/i,' ');
          n.content = (n.content||'').replace(/\s*$/, ' ') +
            '<span class="mm-badge mm-rank" data-rank="'+rank+'" title="'+rank+'">'+letter+'</span>';
        }
      }
      (n.children||[]).forEach(visit);
    };
    visit(node);
  })(root);

  const svg = document.getElementById('mm');
  const mm  = Markmap.create(svg, { htmlLabels:true, initialExpandLevel:-1, autoFit:true, pan:true, zoom:true }, root);

  function applyDarkText(){
    if (!document.body.classList.contains('dark')) return;
    svg.querySelectorAll('text, tspan').forEach(t=>{
      t.setAttribute('fill','#f8fafc'); t.style.fill='#f8fafc'; t.style.opacity='.98';
    });
    svg.querySelectorAll('.markmap-foreign *:not(.user1-node):not(.user2-node):not(.shared-node)')
      .forEach(el=>{ el.style.color='#f8fafc'; });
  }
  applyDarkText();
  new MutationObserver(()=>applyDarkText()).observe(svg, { subtree:true, childList:true });

  document.addEventListener('keydown', e=>{
    if ((e.key||'').toLowerCase() === 'd'){
      document.body.classList.toggle('dark');
      setTimeout(()=>{ try{ mm.fit(); }catch(_){ } applyDarkText(); }, 0);
    }
  });

  setTimeout(()=>{ try{ mm.fit(); }catch(_){ } applyDarkText(); }, 100);
</script>
</body>
</html>
"##;

/// Page title: explicit title, else a personal or comparison heading.
pub fn document_title(meta: &TreeMeta) -> String {
    if let Some(title) = &meta.title {
        return title.clone();
    }
    let taxon = match (&meta.taxon_name, meta.taxon_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("Taxon {id}"),
        (None, None) => "Life".to_string(),
    };
    match meta.users.as_slice() {
        [first, second, ..] => format!("iNaturalist Tree PVP: {first} vs {second} — {taxon}"),
        [one] => format!("iNaturalist Taxa Tree: {one} — {taxon}"),
        [] => format!("iNaturalist Taxa Tree: {taxon}"),
    }
}

/// Self-contained page that renders `outline` client-side with markmap. `snapshot_svg`
/// is embedded base64-encoded in `<noscript>` for viewers without scripts.
pub fn export_interactive_document(
    outline: &str,
    meta: &TreeMeta,
    theme: &Theme,
    settings: &ExportSettings,
    snapshot_svg: Option<&str>,
) -> Result<String, ExportError> {
    let guarded = SCRIPT_CLOSE.replace_all(outline, r"<\/script>");
    let raw_outline = serde_json::to_string(guarded.as_ref()).map_err(|e| ExportError::Json {
        message: e.to_string(),
    })?;

    let snapshot = snapshot_svg
        .map(|svg| {
            format!(
                r#"<img alt="{}" src="data:image/svg+xml;base64,{}"/>"#,
                escape_xml(&meta.label()),
                BASE64.encode(svg.as_bytes())
            )
        })
        .unwrap_or_default();
    let body_class = if theme.is_dark() { r#" class="dark""# } else { "" };

    let html = DOCUMENT
        .replace("@TITLE@", &escape_xml(&document_title(meta)))
        .replace("@BACKGROUND@", &theme.background_color)
        .replace("@FOREGROUND@", &theme.text_color)
        .replace("@BODY_CLASS@", body_class)
        .replace("@SNAPSHOT@", &snapshot)
        .replace("@D3@", &attr("src", &settings.d3_url))
        .replace("@MARKMAP_LIB@", &attr("src", &settings.markmap_lib_url))
        .replace("@MARKMAP_VIEW@", &attr("src", &settings.markmap_view_url))
        // Last, so outline text cannot collide with the other placeholders.
        .replace("@RAW_OUTLINE@", &raw_outline);
    Ok(html)
}
