use itertools::Itertools;
use pawhub_core::dog::Dog;

/// Render dogs as aligned rows for terminal output.
pub(crate) fn render_dogs<'a>(dogs: impl IntoIterator<Item = &'a Dog>) -> String {
    let dogs = dogs.into_iter().collect::<Vec<_>>();
    if dogs.is_empty() {
        return "No dogs found.".to_string();
    }

    let name_width = dogs.iter().map(|dog| dog.name.len()).max().unwrap_or(0);
    let breed_width = dogs.iter().map(|dog| dog.breed.len()).max().unwrap_or(0);

    dogs.iter()
        .map(|dog| {
            format!(
                "{name:<name_width$}  {breed:<breed_width$}  {age:>2} yr  {zip}  [{id}]",
                name = dog.name,
                breed = dog.breed,
                age = dog.age,
                zip = dog.zip_code,
                id = dog.id,
            )
        })
        .join("\n")
}
