use crate::model::Course;

pub static COURSES: [Course; 4] = [
    Course {
        id: "TC2",
        title: "Cours: Thermodynamique et de l'anthropie",
        subtitle: None,
        audio_url: "https://res.cloudinary.com/dysfocdyw/video/upload/v1760100565/Entropie_et_Fl%C3%A8che_du_Temps__D%C3%A9cryptage_du_Second_Principe_de_l_uteurh.mp4",
        duration_seconds: 14 * 60 + 53,
        category: "Génie Civil",
    },
    Course {
        id: "TC3",
        title: "Cours: EUROCODE",
        subtitle: None,
        audio_url: "https://res.cloudinary.com/dysfocdyw/video/upload/v1759517392/Eurocodes_0___1__Les_Fondamentaux_de_la_Construction_S%C3%BBre___De__onvqyy.mp4",
        duration_seconds: 30 * 60,
        category: "Génie Civil",
    },
    Course {
        id: "TC4",
        title: "Cours: Poteaux en Béton Armé",
        subtitle: None,
        audio_url: "https://res.cloudinary.com/dysfocdyw/video/upload/v1759435118/Poteaux_en_B%C3%A9ton_Arm%C3%A9___D%C3%A9cryptage_Ultime_de_l_Eurocode_2_et_du_jcfgcs.mp4",
        duration_seconds: 15 * 60 + 32,
        category: "Génie Civil",
    },
    Course {
        id: "DROIT",
        title: "Droit des Affaires L2 Semestre 2 - Campus 1",
        subtitle: None,
        audio_url: "https://res.cloudinary.com/dysfocdyw/video/upload/v1759662777/Entreprise_en_France_Qui_Fait_Quoi_Statuts_Juridiques_et_Protec_svvqiz.mp4",
        // estimate
        duration_seconds: 25 * 60,
        category: "Droit",
    },
];

/// Lookup over a fixed set of courses. Order is the display order.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    courses: &'static [Course],
}

impl Catalog {
    pub fn new(courses: &'static [Course]) -> Self {
        Self { courses }
    }

    pub fn builtin() -> Self {
        Self::new(&COURSES)
    }

    pub fn get(&self, id: &str) -> Option<&'static Course> {
        self.courses
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(id.trim()))
    }

    pub fn courses(&self) -> &'static [Course] {
        self.courses
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.courses.iter().map(|c| c.id).collect()
    }

    pub fn excluding<'a>(
        &self,
        completed: &'a [&'static str],
    ) -> impl Iterator<Item = &'static Course> + 'a {
        let courses = self.courses;
        courses.iter().filter(move |c| !completed.contains(&c.id))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
