//! Username slugs.
//!
//! Names are folded to lowercase ASCII, with the German umlauts and `ß`
//! expanded (`ü` → `ue`, `ß` → `ss`) rather than stripped, and every run of
//! other characters collapsed into a single separator.

/// Separator used between name parts in generated usernames.
pub const USERNAME_SEPARATOR: char = '.';

/// Slugify `input` using `separator` between words.
///
/// Apostrophes are dropped without leaving a separator, so `O'Brien` becomes
/// `obrien`. Returns an empty string if nothing alphanumeric survives.
pub fn slugify(input: &str, separator: char) -> String {
  let mut out = String::with_capacity(input.len());
  let mut pending_separator = false;

  for ch in input.chars() {
    if matches!(ch, '\'' | '’' | '`' | '´') {
      continue;
    }

    let folded = if ch.is_ascii_alphanumeric() {
      None
    } else {
      match fold(ch) {
        "" => {
          pending_separator = true;
          continue;
        }
        s => Some(s),
      }
    };

    if pending_separator && !out.is_empty() {
      out.push(separator);
    }
    pending_separator = false;
    match folded {
      Some(s) => out.push_str(s),
      None => out.push(ch.to_ascii_lowercase()),
    }
  }

  out
}

/// Lowercase ASCII replacement for a non-ASCII `ch`; empty if `ch` is a
/// word break.
fn fold(ch: char) -> &'static str {
  match ch {
    'ä' | 'Ä' | 'æ' | 'Æ' => "ae",
    'ö' | 'Ö' | 'œ' | 'Œ' => "oe",
    'ü' | 'Ü' => "ue",
    'ß' | 'ẞ' => "ss",
    'à' | 'á' | 'â' | 'ã' | 'å' | 'ā' | 'ą' | 'À' | 'Á' | 'Â' | 'Ã' | 'Å' => "a",
    'ç' | 'ć' | 'č' | 'Ç' | 'Ć' | 'Č' => "c",
    'ď' | 'đ' | 'Ď' | 'Đ' => "d",
    'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' | 'È' | 'É' | 'Ê' | 'Ë' | 'Ě' => "e",
    'ğ' | 'Ğ' => "g",
    'ì' | 'í' | 'î' | 'ï' | 'ı' | 'Ì' | 'Í' | 'Î' | 'Ï' | 'İ' => "i",
    'ł' | 'Ł' => "l",
    'ñ' | 'ń' | 'ň' | 'Ñ' | 'Ń' | 'Ň' => "n",
    'ò' | 'ó' | 'ô' | 'õ' | 'ø' | 'ō' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ø' => "o",
    'ř' | 'Ř' => "r",
    'ś' | 'š' | 'ş' | 'Ś' | 'Š' | 'Ş' => "s",
    'ť' | 'ţ' | 'Ť' | 'Ţ' => "t",
    'ù' | 'ú' | 'û' | 'ů' | 'ū' | 'Ù' | 'Ú' | 'Û' | 'Ů' => "u",
    'ý' | 'ÿ' | 'Ý' => "y",
    'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => "z",
    _ => "",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn slug(s: &str) -> String { slugify(s, USERNAME_SEPARATOR) }

  #[test]
  fn plain_name() {
    assert_eq!(slug("Jane Doe"), "jane.doe");
  }

  #[test]
  fn umlauts_and_sharp_s_expand() {
    assert_eq!(slug("Jürgen Großmann"), "juergen.grossmann");
    assert_eq!(slug("Ömer Ärger"), "oemer.aerger");
  }

  #[test]
  fn accents_fold() {
    assert_eq!(slug("José Núñez"), "jose.nunez");
    assert_eq!(slug("Zoë Łukasz"), "zoe.lukasz");
  }

  #[test]
  fn separators_collapse_and_trim() {
    assert_eq!(slug("  Anna -- Maria   Schmidt! "), "anna.maria.schmidt");
    assert_eq!(slug("guest.Max Mustermann"), "guest.max.mustermann");
  }

  #[test]
  fn apostrophes_vanish() {
    assert_eq!(slug("Siobhan O'Brien"), "siobhan.obrien");
  }

  #[test]
  fn nothing_alphanumeric_is_empty() {
    assert_eq!(slug("!!! ???"), "");
  }
}
