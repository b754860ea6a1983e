use records::Entity;

#[derive(Entity)]
struct Celestial;

#[derive(Entity)]
#[entity("space_port")]
struct Spaceport;

fn main() {
    assert_eq!(Celestial::table(), "celestial");
    assert_eq!(Spaceport::table(), "space_port");
}
