use quick_xml::events::Event;
use quick_xml::Reader;
use url::Url;

/// The parts of robots.txt the crawler cares about.
#[derive(Debug, Clone, Default)]
pub struct Robots {
    pub sitemaps: Vec<String>,
    allows: Vec<String>,
    disallows: Vec<String>,
}

pub fn parse_robots(txt: &str) -> Robots {
    // Sitemap lines are global; Allow/Disallow only from the '*' group.
    let mut active = false;
    let mut robots = Robots::default();
    for line in txt.lines() {
        let l = line.trim();
        if l.is_empty() || l.starts_with('#') { continue; }
        if let Some((k, v)) = l.split_once(':') {
            let key = k.trim().to_lowercase();
            let val = v.trim();
            match key.as_str() {
                "sitemap" if !val.is_empty() => robots.sitemaps.push(val.to_string()),
                "user-agent" => { active = val == "*"; }
                "allow" if active && !val.is_empty() => robots.allows.push(val.to_string()),
                "disallow" if active && !val.is_empty() => robots.disallows.push(val.to_string()),
                _ => {}
            }
        }
    }
    robots
}

impl Robots {
    pub fn allows(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(u) => self.path_allowed(u.path()),
            Err(_) => false,
        }
    }

    fn path_allowed(&self, path: &str) -> bool {
        // longest matching Allow vs Disallow, ties go to Allow
        let longest = |rules: &[String]| rules.iter().filter(|r| path.starts_with(r.as_str())).map(|r| r.len()).max();
        match (longest(&self.allows), longest(&self.disallows)) {
            (Some(a), Some(d)) => a >= d,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }
}

/// Every `<loc>` in a sitemap or sitemap index, in document order.
pub fn parse_sitemap(xml: &[u8]) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_loc = false;
    let mut locs = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"loc" => in_loc = true,
            Event::End(e) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Event::Text(t) if in_loc => locs.push(t.unescape()?.trim().to_string()),
            Event::CData(t) if in_loc => locs.push(String::from_utf8_lossy(&t).trim().to_string()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(locs)
}

pub fn find_entry<'a>(entries: &'a [String], pattern: &str) -> Option<&'a str> {
    entries.iter().find(|e| e.contains(pattern)).map(String::as_str)
}
