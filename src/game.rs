//! "Guess the city": show a map fragment of a random built-in city and let
//! the player name it. The score lives only as long as the session.

use crate::geo::{GeoPoint, NamedPoint};
use crate::location::builtin;
use crate::staticmap::StaticMap;
use crate::tasks::TaskError;
use rand::Rng;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Maximum random shift of the view centre, degrees (about 2 km).
pub const VIEW_OFFSET_DEG: f64 = 0.02;
pub const MIN_ROUND_ZOOM: u8 = 13;
pub const MAX_ROUND_ZOOM: u8 = 16;

const QUIT_WORDS: &[&str] = &["exit", "quit", "выход"];
const YES_WORDS: &[&str] = &["y", "yes", "да"];

/// One round: the hidden city and the view shown to the player.
#[derive(Debug, Clone)]
pub struct Round {
    pub city: NamedPoint,
    pub view: GeoPoint,
    pub zoom: u8,
    pub image_name: String,
}

impl Round {
    pub fn map(&self, lang: &str) -> StaticMap {
        StaticMap::new(lang).center(self.view).zoom(self.zoom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guess {
    Correct,
    Wrong,
    Quit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub correct: u32,
    pub played: u32,
}

pub struct Game<R: Rng> {
    cities: Vec<NamedPoint>,
    rng: R,
    score: Score,
}

impl<R: Rng> Game<R> {
    pub fn new(rng: R) -> Self {
        Self::with_cities(builtin::cities(), rng)
    }

    pub fn with_cities(cities: Vec<NamedPoint>, rng: R) -> Self {
        Self { cities, rng, score: Score::default() }
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn cities(&self) -> &[NamedPoint] {
        &self.cities
    }

    /// Pick a city, shift the view randomly and choose a zoom.
    pub fn new_round(&mut self) -> Option<Round> {
        if self.cities.is_empty() {
            return None;
        }
        let city = self.cities[self.rng.gen_range(0..self.cities.len())].clone();
        let dx = self.rng.gen_range(-VIEW_OFFSET_DEG..=VIEW_OFFSET_DEG);
        let dy = self.rng.gen_range(-VIEW_OFFSET_DEG..=VIEW_OFFSET_DEG);
        let view = GeoPoint::new(city.point.lon() + dx, city.point.lat() + dy).unwrap_or(city.point);
        let zoom = self.rng.gen_range(MIN_ROUND_ZOOM..=MAX_ROUND_ZOOM);
        let image_name = format!("city_{}.png", self.rng.gen_range(1000..=9999));
        Some(Round { city, view, zoom, image_name })
    }

    /// Judge one answer. Aliases of the hidden city count as correct.
    pub fn check(&self, round: &Round, answer: &str) -> Guess {
        let answer = answer.trim().to_lowercase();
        if QUIT_WORDS.contains(&answer.as_str()) {
            return Guess::Quit;
        }
        if answer == round.city.name.to_lowercase() {
            return Guess::Correct;
        }
        match builtin::exact_lookup(&answer) {
            Some(found) if found.name == round.city.name => Guess::Correct,
            _ => Guess::Wrong,
        }
    }

    /// Interactive loop. `render` saves the round's image and returns its path.
    pub fn play<I, O, F>(&mut self, mut input: I, mut out: O, mut render: F) -> Result<Score, TaskError>
    where
        I: BufRead,
        O: Write,
        F: FnMut(&Round) -> Result<PathBuf, TaskError>,
    {
        writeln!(out, "Welcome to 'Guess the city'!")?;
        writeln!(out, "Each round shows a map fragment of one of the cities below.")?;

        loop {
            let Some(round) = self.new_round() else {
                writeln!(out, "No cities to play with.")?;
                break;
            };
            self.score.played += 1;

            let quit = match render(&round) {
                Ok(path) => {
                    writeln!(out, "\nNew city image saved as {}", path.display())?;
                    writeln!(out, "Available cities:")?;
                    for (i, c) in self.cities.iter().enumerate() {
                        writeln!(out, "{}. {}", i + 1, c.name)?;
                    }
                    self.guess_loop(&round, &mut input, &mut out)?
                }
                Err(e) => {
                    log::error!("Round image failed: {}", e);
                    writeln!(out, "Could not get the city image: {}", e)?;
                    false
                }
            };

            writeln!(out, "\nScore: {}/{}", self.score.correct, self.score.played)?;
            if quit {
                break;
            }

            write!(out, "\nPlay again? (yes/no): ")?;
            out.flush()?;
            let again = read_line(&mut input)?.unwrap_or_default().to_lowercase();
            if !YES_WORDS.contains(&again.as_str()) {
                break;
            }
        }

        writeln!(out, "\nGame over! Final score: {}/{}", self.score.correct, self.score.played)?;
        Ok(self.score)
    }

    /// Returns `true` when the player asked to quit.
    fn guess_loop<I: BufRead, O: Write>(&mut self, round: &Round, input: &mut I, out: &mut O) -> Result<bool, TaskError> {
        loop {
            write!(out, "\nYour answer (or 'exit' to quit): ")?;
            out.flush()?;
            let Some(answer) = read_line(input)? else {
                return Ok(true);
            };
            match self.check(round, &answer) {
                Guess::Correct => {
                    self.score.correct += 1;
                    writeln!(out, "Correct! It is {}", round.city.name)?;
                    return Ok(false);
                }
                Guess::Quit => return Ok(true),
                Guess::Wrong => writeln!(out, "Wrong, try again!")?,
            }
        }
    }
}

/// One trimmed line, or `None` at end of input.
fn read_line<I: BufRead>(input: &mut I) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
